use anyhow::{Context, Result};
use ossec_config_core::{LocationType, ResponsePreset};
use serde_json::json;

use super::Session;
use super::args::{ActiveResponseCommand, PresetArgs};

pub(super) fn handle(session: &Session, command: ActiveResponseCommand) -> Result<()> {
    match command {
        ActiveResponseCommand::List { json } => list(session, json),
        ActiveResponseCommand::Preset(args) => install(session, &args),
    }
}

fn list(session: &Session, json: bool) -> Result<()> {
    let manager = session.open()?;
    let commands: Vec<_> = manager.commands().collect();
    let responses: Vec<_> = manager.active_responses().collect();

    if json {
        let report = json!({
            "commands": commands,
            "active_responses": responses,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Commands:");
    for command in &commands {
        println!(
            "  {} -> {}",
            command.get("name").unwrap_or("<unnamed>"),
            command.get("executable").unwrap_or("-")
        );
    }
    println!("Active responses:");
    for response in &responses {
        let fields: Vec<String> = response
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        println!("  {}", fields.join(" "));
    }
    Ok(())
}

fn install(session: &Session, args: &PresetArgs) -> Result<()> {
    let preset = ResponsePreset::from(args.preset);
    let location = LocationType::from(args.location);

    let mut response = preset.response(location);
    if let Some(agent_id) = &args.agent_id {
        response = response.with_agent_id(agent_id.as_str());
    }
    if let Some(level) = args.level {
        response = response.with_level(level);
    }
    if let Some(timeout) = args.timeout {
        response = response.with_timeout(timeout);
    }

    let mut manager = session.open()?;
    manager
        .install_preset_with(preset, response)
        .with_context(|| format!("failed to install {preset:?} preset"))?;
    session.persist(&manager)?;
    println!("Installed {} response at {location}", preset.command().name);
    Ok(())
}
