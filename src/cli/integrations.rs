use anyhow::{Result, bail};
use ossec_config_core::IntegrationSelector;

use super::Session;
use super::args::{IntegrationCommand, SelectorArgs};

pub(super) fn handle(session: &Session, command: IntegrationCommand) -> Result<()> {
    match command {
        IntegrationCommand::List { json } => list(session, json),
        IntegrationCommand::Add { fields } => add(session, fields),
        IntegrationCommand::Remove(selector) => remove(session, selector),
    }
}

fn list(session: &Session, json: bool) -> Result<()> {
    let manager = session.open()?;
    let integrations: Vec<_> = manager.read_integrations().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&integrations)?);
        return Ok(());
    }

    if integrations.is_empty() {
        println!("No integrations configured");
        return Ok(());
    }
    for integration in &integrations {
        let fields: Vec<String> = integration
            .fields()
            .iter()
            .filter(|(key, _)| *key != "name")
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        println!(
            "{}: {}",
            integration.name().unwrap_or("<unnamed>"),
            fields.join(" ")
        );
    }
    Ok(())
}

fn add(session: &Session, fields: Vec<(String, String)>) -> Result<()> {
    let mut manager = session.open()?;
    let name = fields
        .iter()
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| "<unnamed>".to_string());

    manager.insert_integration(fields)?;
    session.persist(&manager)?;
    println!("Added integration {name}");
    Ok(())
}

fn remove(session: &Session, args: SelectorArgs) -> Result<()> {
    let mut selector = args.fields.into_iter().collect::<IntegrationSelector>();
    if let Some(name) = args.name {
        selector = selector.with_field("name", name);
    }
    if let Some(hook_url) = args.hook_url {
        selector = selector.with_hook_url(hook_url);
    }
    if selector.is_empty() {
        bail!("pass --name, --hook-url or --field to pick an integration");
    }

    let mut manager = session.open()?;
    let removed = manager.delete_integration(&selector)?;
    session.persist(&manager)?;
    println!(
        "Removed integration {}",
        removed.name().unwrap_or("<unnamed>")
    );
    Ok(())
}
