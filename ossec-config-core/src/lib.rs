//! Read, edit and persist Wazuh/OSSEC `ossec.conf` files.
//!
//! [`ConfigManager`] owns one parsed file. Edits happen in memory and reach
//! the disk only through [`ConfigManager::save`], [`ConfigManager::save_with`],
//! [`ConfigManager::create_backup`] or [`ConfigManager::restore`]; saves
//! replace the file atomically and can copy the previous version aside first.
//!
//! ```no_run
//! use ossec_config_core::{ConfigManager, IntegrationSelector};
//!
//! # fn main() -> ossec_config_core::Result<()> {
//! let mut manager = ConfigManager::open("/var/ossec/etc/ossec.conf")?;
//! manager.insert_integration([
//!     ("name", "slack"),
//!     ("hook_url", "https://hooks.slack.com/services/T000/B000/XXXX"),
//!     ("level", "10"),
//!     ("alert_format", "json"),
//! ])?;
//! manager.update_xml_block("ossec_config/vulnerability-detection", [("enabled", "yes")])?;
//! manager.delete_integration(&IntegrationSelector::by_name("pagerduty")).ok();
//! manager.save(true)?;
//! # Ok(())
//! # }
//! ```

pub mod active_response;
mod backup;
pub mod document;
pub mod error;
pub mod fields;
pub mod integrations;
pub mod manager;
pub mod options;
pub mod sections;
pub mod xml;

pub use active_response::{
    ActiveResponse, ActiveResponseFilter, LocationType, NewCommand, ResponsePreset,
};
pub use document::ConfigDocument;
pub use error::{ConfigError, Result};
pub use fields::FieldSet;
pub use integrations::{Integration, IntegrationSelector, Integrations};
pub use manager::{ConfigManager, SaveOptions, SaveReport};
pub use options::ManagerOptions;
pub use sections::{BlockUpdates, BlockValue, ListItem};
pub use xml::{BlockPath, Element, Node};
