use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::xml::validate_name;

/// Tunables for [`ConfigManager`](crate::ConfigManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManagerOptions {
    /// Name of the top-level block that new entries are appended to.
    #[serde(default = "ManagerOptions::default_root_block")]
    pub root_block: String,
    /// Merge repeated top-level root blocks into the first one on load.
    #[serde(default = "ManagerOptions::default_consolidate_root_blocks")]
    pub consolidate_root_blocks: bool,
    /// Spaces per nesting level when writing the file back.
    #[serde(default = "ManagerOptions::default_indent")]
    pub indent: usize,
    /// Directory for automatic backups. Defaults to the config file's directory.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    /// `chrono` format string used in automatic backup names.
    #[serde(default = "ManagerOptions::default_backup_timestamp_format")]
    pub backup_timestamp_format: String,
    /// Fail loading when an active response names an undefined command.
    #[serde(default)]
    pub verify_command_references: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            root_block: Self::default_root_block(),
            consolidate_root_blocks: Self::default_consolidate_root_blocks(),
            indent: Self::default_indent(),
            backup_dir: None,
            backup_timestamp_format: Self::default_backup_timestamp_format(),
            verify_command_references: false,
        }
    }
}

impl ManagerOptions {
    const MAX_INDENT: usize = 8;

    fn default_root_block() -> String {
        "ossec_config".to_string()
    }

    const fn default_consolidate_root_blocks() -> bool {
        true
    }

    const fn default_indent() -> usize {
        2
    }

    fn default_backup_timestamp_format() -> String {
        "%Y%m%d_%H%M%S".to_string()
    }

    /// Load options from a TOML file; missing keys take their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|err| ConfigError::io("reading options", path, err))?;
        let options: Self = toml::from_str(&content)
            .map_err(|err| ConfigError::parse(path.display().to_string(), err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("root_block", &self.root_block)?;

        if self.indent > Self::MAX_INDENT {
            return Err(ConfigError::validation(
                "indent",
                format!("must be at most {}", Self::MAX_INDENT),
            ));
        }

        let format = self.backup_timestamp_format.trim();
        if format.is_empty() || format.contains(['/', '\\']) {
            return Err(ConfigError::validation(
                "backup_timestamp_format",
                "must be non-empty and must not contain path separators",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = ManagerOptions::default();
        assert_eq!(options.root_block, "ossec_config");
        assert!(options.consolidate_root_blocks);
        assert_eq!(options.indent, 2);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let options: ManagerOptions =
            toml::from_str("indent = 4\nbackup_dir = \"/tmp/backups\"\n").expect("toml");
        assert_eq!(options.indent, 4);
        assert_eq!(options.backup_dir, Some(PathBuf::from("/tmp/backups")));
        assert_eq!(options.backup_timestamp_format, "%Y%m%d_%H%M%S");
        assert!(options.consolidate_root_blocks);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let wide = ManagerOptions {
            indent: 12,
            ..Default::default()
        };
        assert!(wide.validate().is_err());

        let nested = ManagerOptions {
            backup_timestamp_format: "%Y/%m".to_string(),
            ..Default::default()
        };
        assert!(nested.validate().is_err());
    }
}
