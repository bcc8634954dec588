use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ossec_config_core::{LocationType, ResponsePreset};

pub const DEFAULT_CONFIG_PATH: &str = "/var/ossec/etc/ossec.conf";

#[derive(Debug, Parser)]
#[command(name = "ossec-config")]
#[command(about = "Inspect and edit Wazuh/OSSEC ossec.conf files")]
#[command(version)]
pub struct Cli {
    /// Configuration file to operate on
    #[arg(
        short,
        long,
        global = true,
        env = "OSSEC_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// TOML file with manager options (root block, indent, backup directory, ...)
    #[arg(long, global = true, value_name = "TOML")]
    pub options: Option<PathBuf>,

    /// Save edits without copying the previous file aside first
    #[arg(long, global = true)]
    pub no_backup: bool,

    /// Log library activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Alert forwarding integrations
    #[command(subcommand)]
    Integrations(IntegrationCommand),

    /// Arbitrary configuration blocks, addressed like `ossec_config/syscheck`
    #[command(subcommand)]
    Block(BlockCommand),

    /// CDB lists referenced by the ruleset
    #[command(subcommand)]
    Ruleset(RulesetCommand),

    /// Commands and active responses
    #[command(subcommand)]
    ActiveResponse(ActiveResponseCommand),

    /// Copy the configuration file aside
    Backup {
        /// Backup location; defaults to a timestamped name next to the file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the configuration file with a backup
    Restore {
        /// Backup to restore from
        backup: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum IntegrationCommand {
    /// Print every integration
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Append an integration built from KEY=VALUE fields
    Add {
        /// Field in KEY=VALUE form, in output order
        #[arg(value_parser = parse_key_value, required = true)]
        fields: Vec<(String, String)>,
    },
    /// Remove the first integration matching the selector
    Remove(SelectorArgs),
}

#[derive(Debug, Args)]
pub struct SelectorArgs {
    /// Integration name
    #[arg(long)]
    pub name: Option<String>,

    /// Hook URL
    #[arg(long)]
    pub hook_url: Option<String>,

    /// Any other field in KEY=VALUE form
    #[arg(long = "field", value_parser = parse_key_value)]
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Subcommand)]
pub enum BlockCommand {
    /// Print the block at PATH
    Show { path: String },
    /// Set child values (or `@attribute` values) of the block at PATH
    Set {
        path: String,
        /// Update in KEY=VALUE form
        #[arg(value_parser = parse_key_value, required = true)]
        updates: Vec<(String, String)>,
    },
    /// Remove every element matching PATH
    Remove { path: String },
}

#[derive(Debug, Subcommand)]
pub enum RulesetCommand {
    /// Reference a CDB list unless it is already configured
    AddList {
        /// List path, such as `etc/lists/malicious-ioc/malware-hashes`
        value: String,

        /// Ruleset block to add the list to
        #[arg(long, default_value = "ossec_config/ruleset")]
        path: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ActiveResponseCommand {
    /// Print declared commands and active responses
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Install a ready-made response
    Preset(PresetArgs),
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    pub preset: PresetArg,

    #[arg(long, value_enum, default_value_t = LocationArg::Local)]
    pub location: LocationArg,

    /// Agent id, required with `--location defined-agent`
    #[arg(long)]
    pub agent_id: Option<String>,

    /// Override the preset's alert level
    #[arg(long)]
    pub level: Option<u8>,

    /// Override the preset's timeout in seconds
    #[arg(long)]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresetArg {
    SshBlock,
    AgentRestart,
    UserDisable,
}

impl From<PresetArg> for ResponsePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::SshBlock => ResponsePreset::SshBlock,
            PresetArg::AgentRestart => ResponsePreset::AgentRestart,
            PresetArg::UserDisable => ResponsePreset::UserDisable,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LocationArg {
    Local,
    Server,
    DefinedAgent,
    All,
}

impl From<LocationArg> for LocationType {
    fn from(value: LocationArg) -> Self {
        match value {
            LocationArg::Local => LocationType::Local,
            LocationArg::Server => LocationType::Server,
            LocationArg::DefinedAgent => LocationType::DefinedAgent,
            LocationArg::All => LocationType::All,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
