use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading, editing or persisting a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse '{origin}': {message}")]
    Parse { origin: String, message: String },

    #[error("{kind} '{target}' not found")]
    NotFound { kind: &'static str, target: String },

    #[error("I/O error while {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no configuration file has been loaded")]
    NotLoaded,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub(crate) fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, target: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            target: target.into(),
        }
    }

    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the error reports an unresolved path or selector.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when the source file was missing or not well-formed XML.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
