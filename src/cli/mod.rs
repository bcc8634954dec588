use std::path::PathBuf;

use anyhow::{Context, Result};
use ossec_config_core::{ConfigManager, ManagerOptions};

mod active_response;
mod args;
mod backup;
mod blocks;
mod integrations;

pub use args::{Cli, Commands};

/// Everything a subcommand needs to open and persist the configuration.
#[derive(Debug)]
pub struct Session {
    config: PathBuf,
    options: ManagerOptions,
    backup: bool,
}

impl Session {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let options = match &cli.options {
            Some(path) => ManagerOptions::from_toml_file(path)
                .with_context(|| format!("failed to load options from {}", path.display()))?,
            None => ManagerOptions::default(),
        };

        Ok(Self {
            config: cli.config.clone(),
            options,
            backup: !cli.no_backup,
        })
    }

    fn open(&self) -> Result<ConfigManager> {
        tracing::debug!(config = %self.config.display(), "opening configuration");
        ConfigManager::open_with_options(&self.config, self.options.clone())
            .with_context(|| format!("failed to load {}", self.config.display()))
    }

    /// Write `manager` back, backing up the previous file unless disabled.
    fn persist(&self, manager: &ConfigManager) -> Result<()> {
        let report = manager
            .save(self.backup)
            .with_context(|| format!("failed to save {}", self.config.display()))?;
        if let Some(backup) = &report.backup {
            println!("Backup written to {}", backup.display());
        }
        println!("Saved {}", report.path.display());
        Ok(())
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let session = Session::from_cli(&cli)?;
    match cli.command {
        Commands::Integrations(command) => integrations::handle(&session, command),
        Commands::Block(command) => blocks::handle(&session, command),
        Commands::Ruleset(command) => blocks::handle_ruleset(&session, command),
        Commands::ActiveResponse(command) => active_response::handle(&session, command),
        Commands::Backup { output } => backup::create(&session, output.as_deref()),
        Commands::Restore { backup } => backup::restore(&session, &backup),
    }
}
