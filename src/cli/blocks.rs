use anyhow::Result;
use ossec_config_core::BlockUpdates;

use super::Session;
use super::args::{BlockCommand, RulesetCommand};

pub(super) fn handle(session: &Session, command: BlockCommand) -> Result<()> {
    match command {
        BlockCommand::Show { path } => {
            let manager = session.open()?;
            print!("{}", manager.render_block(&path)?);
            Ok(())
        }
        BlockCommand::Set { path, updates } => {
            let mut manager = session.open()?;
            let count = updates.len();
            manager.update_xml_block(&path, updates.into_iter().collect::<BlockUpdates>())?;
            session.persist(&manager)?;
            println!("Updated {count} value(s) in {path}");
            Ok(())
        }
        BlockCommand::Remove { path } => {
            let mut manager = session.open()?;
            let removed = manager.remove_section(&path)?;
            session.persist(&manager)?;
            println!("Removed {removed} element(s) at {path}");
            Ok(())
        }
    }
}

pub(super) fn handle_ruleset(session: &Session, command: RulesetCommand) -> Result<()> {
    match command {
        RulesetCommand::AddList { value, path } => {
            let mut manager = session.open()?;
            if manager.add_ruleset_list(&path, &value)? {
                session.persist(&manager)?;
                println!("Added list {value}");
            } else {
                println!("List {value} is already configured");
            }
            Ok(())
        }
    }
}
