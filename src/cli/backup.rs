use std::path::Path;

use anyhow::{Context, Result};
use ossec_config_core::ConfigManager;

use super::Session;

pub(super) fn create(session: &Session, output: Option<&Path>) -> Result<()> {
    let manager = session.open()?;
    let backup = manager.create_backup(output)?;
    println!("Backup written to {}", backup.display());
    Ok(())
}

/// Restores even when the live file no longer parses.
pub(super) fn restore(session: &Session, backup: &Path) -> Result<()> {
    ConfigManager::recover(&session.config, backup, session.options.clone())
        .with_context(|| format!("failed to restore from {}", backup.display()))?;
    println!(
        "Restored {} from {}",
        session.config.display(),
        backup.display()
    );
    Ok(())
}
