use std::fmt;
use std::str::FromStr;

use super::tree::validate_name;
use crate::error::{ConfigError, Result};

/// Slash-separated element locator such as `ossec_config/vulnerability-detection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPath {
    segments: Vec<String>,
}

impl BlockPath {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim().trim_start_matches("./").trim_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::validation("path", "path must not be empty"));
        }

        let segments = trimmed
            .split('/')
            .map(|segment| {
                let segment = segment.trim();
                validate_name("path segment", segment).map(|()| segment.to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, i.e. the name of the addressed element.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Segments leading to the addressed element's parent.
    pub fn parent_segments(&self) -> &[String] {
        self.segments
            .split_last()
            .map(|(_, parent)| parent)
            .unwrap_or_default()
    }
}

impl FromStr for BlockPath {
    type Err = ConfigError;

    fn from_str(path: &str) -> Result<Self> {
        Self::parse(path)
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
