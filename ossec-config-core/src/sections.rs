//! Generic block edits addressed by [`BlockPath`].

use indexmap::IndexMap;

use crate::error::{ConfigError, Result};
use crate::manager::ConfigManager;
use crate::xml::{BlockPath, Element, render_element, validate_name};

/// One `<tag>text</tag>` entry of a list value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub tag: String,
    pub text: String,
}

impl ListItem {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
        }
    }
}

/// Value written under one key of a [`BlockUpdates`] tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValue {
    /// Element text, or the attribute value for `@name` keys.
    Text(String),
    /// Nested child block.
    Block(BlockUpdates),
    /// Child whose content is replaced by the listed items.
    List(Vec<ListItem>),
}

impl From<&str> for BlockValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for BlockValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<BlockUpdates> for BlockValue {
    fn from(value: BlockUpdates) -> Self {
        Self::Block(value)
    }
}

impl From<Vec<ListItem>> for BlockValue {
    fn from(value: Vec<ListItem>) -> Self {
        Self::List(value)
    }
}

/// Ordered description of child elements and attributes to write into a
/// block. Keys starting with `@` address attributes of the block itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockUpdates {
    entries: IndexMap<String, BlockValue>,
}

impl BlockUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, BlockValue::Text(value.into()));
        self
    }

    pub fn attribute(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(
            format!("@{}", name.as_ref()),
            BlockValue::Text(value.into()),
        );
        self
    }

    pub fn block(mut self, key: impl Into<String>, nested: BlockUpdates) -> Self {
        self.insert(key, BlockValue::Block(nested));
        self
    }

    pub fn list(
        mut self,
        key: impl Into<String>,
        items: impl IntoIterator<Item = ListItem>,
    ) -> Self {
        self.insert(key, BlockValue::List(items.into_iter().collect()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<BlockValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlockValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every key and nested value before anything is written.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.entries {
            match (key.strip_prefix('@'), value) {
                (Some(attribute), BlockValue::Text(_)) => validate_name("attribute", attribute)?,
                (Some(_), _) => {
                    return Err(ConfigError::validation(
                        key.as_str(),
                        "attributes only take text values",
                    ));
                }
                (None, BlockValue::Text(_)) => validate_name("element", key)?,
                (None, BlockValue::Block(nested)) => {
                    validate_name("element", key)?;
                    nested.validate()?;
                }
                (None, BlockValue::List(items)) => {
                    validate_name("element", key)?;
                    for item in items {
                        validate_name("list item", &item.tag)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for BlockUpdates
where
    K: Into<String>,
    V: Into<BlockValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut updates = Self::new();
        for (key, value) in iter {
            updates.insert(key, value);
        }
        updates
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for BlockUpdates
where
    K: Into<String>,
    V: Into<BlockValue>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Merge `updates` into `element`: existing children are reused, missing ones
/// are appended, untouched children stay as they are.
fn apply_updates(element: &mut Element, updates: &BlockUpdates) {
    for (key, value) in updates.iter() {
        match (key.strip_prefix('@'), value) {
            (Some(attribute), BlockValue::Text(text)) => {
                element.set_attribute(attribute, text.as_str());
            }
            (Some(_), _) => {}
            (None, BlockValue::Text(text)) => {
                element.with_child(key, |child| child.set_text(text.as_str()));
            }
            (None, BlockValue::Block(nested)) => {
                element.with_child(key, |child| apply_updates(child, nested));
            }
            (None, BlockValue::List(items)) => {
                element.with_child(key, |child| {
                    child.clear_children();
                    push_items(child, items);
                });
            }
        }
    }
}

/// Append `section` to `element` as new children, never reusing existing ones.
fn append_section(element: &mut Element, section: &BlockUpdates) {
    for (key, value) in section.iter() {
        match (key.strip_prefix('@'), value) {
            (Some(attribute), BlockValue::Text(text)) => {
                element.set_attribute(attribute, text.as_str());
            }
            (Some(_), _) => {}
            (None, BlockValue::Text(text)) => {
                element.push_element(Element::with_text(key, text.as_str()));
            }
            (None, BlockValue::Block(nested)) => {
                let mut child = Element::new(key);
                append_section(&mut child, nested);
                element.push_element(child);
            }
            (None, BlockValue::List(items)) => {
                let mut child = Element::new(key);
                push_items(&mut child, items);
                element.push_element(child);
            }
        }
    }
}

fn push_items(parent: &mut Element, items: &[ListItem]) {
    for item in items {
        parent.push_element(Element::with_text(item.tag.as_str(), item.text.as_str()));
    }
}

impl ConfigManager {
    /// Resolve `path` to its element.
    pub fn block(&self, path: &str) -> Result<&Element> {
        let parsed = BlockPath::parse(path)?;
        self.document()
            .find(&parsed)
            .ok_or_else(|| ConfigError::not_found("block", parsed.to_string()))
    }

    /// Serialize the block at `path` on its own.
    pub fn render_block(&self, path: &str) -> Result<String> {
        let block = self.block(path)?;
        render_element(block, self.options().indent)
    }

    /// Whether `path` resolves. Malformed paths never resolve.
    pub fn section_exists(&self, path: &str) -> bool {
        BlockPath::parse(path)
            .ok()
            .is_some_and(|parsed| self.document().find(&parsed).is_some())
    }

    /// Set or create children (and `@attributes`) of the block at `path`.
    ///
    /// The path itself is never created; an unresolved path leaves the
    /// document untouched.
    pub fn update_xml_block(
        &mut self,
        path: &str,
        updates: impl Into<BlockUpdates>,
    ) -> Result<()> {
        let parsed = BlockPath::parse(path)?;
        let updates = updates.into();
        updates.validate()?;

        let block = self
            .document_mut()
            .find_mut(&parsed)
            .ok_or_else(|| ConfigError::not_found("block", parsed.to_string()))?;
        apply_updates(block, &updates);

        tracing::debug!(path = %parsed, keys = updates.len(), "block updated");
        Ok(())
    }

    /// Append `section` under `path`, creating missing path segments.
    pub fn add_section(&mut self, path: &str, section: impl Into<BlockUpdates>) -> Result<()> {
        let parsed = BlockPath::parse(path)?;
        let section = section.into();
        section.validate()?;

        let document = self.document_mut();
        if let Some(parent) = document.find_mut(&parsed) {
            append_section(parent, &section);
        } else {
            document
                .with_path_created(parsed.segments(), |parent| append_section(parent, &section))
                .ok_or_else(|| ConfigError::not_found("block", parsed.to_string()))?;
            tracing::debug!(path = %parsed, "created missing block path");
        }

        tracing::debug!(path = %parsed, "section added");
        Ok(())
    }

    /// Remove every element named by the last segment of `path` from the
    /// parent the leading segments resolve to. Returns how many were removed.
    pub fn remove_section(&mut self, path: &str) -> Result<usize> {
        let parsed = BlockPath::parse(path)?;
        let removed = self.document_mut().remove_all_at(&parsed);
        if removed == 0 {
            return Err(ConfigError::not_found("block", parsed.to_string()));
        }

        tracing::debug!(path = %parsed, removed, "section removed");
        Ok(removed)
    }

    /// Append `<list>value</list>` to the ruleset block at `path` unless the
    /// same list is already configured. Returns whether it was added.
    pub fn add_ruleset_list(&mut self, path: &str, value: &str) -> Result<bool> {
        let parsed = BlockPath::parse(path)?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::validation("list", "value must not be empty"));
        }

        let ruleset = self
            .document_mut()
            .find_mut(&parsed)
            .ok_or_else(|| ConfigError::not_found("block", parsed.to_string()))?;

        let exists = ruleset
            .child_elements()
            .any(|list| list.name() == "list" && list.text().as_deref() == Some(value));
        if exists {
            tracing::debug!(path = %parsed, list = value, "ruleset list already present");
            return Ok(false);
        }

        ruleset.push_element(Element::with_text("list", value));
        tracing::debug!(path = %parsed, list = value, "ruleset list added");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn apply_updates_merges_into_existing_children() {
        let mut block = Element::new("vulnerability-detection");
        block.push_element(Element::with_text("enabled", "no"));
        block.push_element(Element::with_text("feed-update-interval", "60m"));

        let updates = BlockUpdates::new()
            .set("enabled", "yes")
            .set("index-status", "yes")
            .attribute("profile", "strict");
        apply_updates(&mut block, &updates);

        let names: Vec<&str> = block.child_elements().map(Element::name).collect();
        assert_eq!(names, vec!["enabled", "feed-update-interval", "index-status"]);
        assert_eq!(block.child_text("enabled").as_deref(), Some("yes"));
        assert_eq!(block.attribute("profile"), Some("strict"));
    }

    #[test]
    fn list_values_replace_previous_items() {
        let mut block = Element::new("syscheck");
        let mut directories = Element::new("directories");
        directories.push_element(Element::with_text("dir", "/etc"));
        block.push_element(directories);

        let updates = BlockUpdates::new().list(
            "directories",
            [ListItem::new("dir", "/usr/bin"), ListItem::new("dir", "/sbin")],
        );
        apply_updates(&mut block, &updates);

        let items: Vec<String> = block
            .find_child("directories")
            .expect("directories")
            .child_elements()
            .filter_map(Element::text)
            .collect();
        assert_eq!(items, vec!["/usr/bin", "/sbin"]);
    }

    #[test]
    fn append_section_always_adds_new_children() {
        let mut block = Element::new("ossec_config");
        block.push_element(Element::with_text("localfile", "old"));

        let section = BlockUpdates::new().block(
            "localfile",
            BlockUpdates::new()
                .set("log_format", "syslog")
                .set("location", "/var/log/auth.log"),
        );
        append_section(&mut block, &section);

        assert_eq!(
            block
                .child_elements()
                .filter(|child| child.name() == "localfile")
                .count(),
            2
        );
    }

    #[test]
    fn validation_rejects_bad_keys() {
        assert!(BlockUpdates::from([("enabled", "yes")]).validate().is_ok());
        assert!(BlockUpdates::from([("bad key", "yes")]).validate().is_err());
        assert!(
            BlockUpdates::new()
                .block("@attr", BlockUpdates::new())
                .validate()
                .is_err()
        );
        assert!(
            BlockUpdates::new()
                .list("items", [ListItem::new("1bad", "x")])
                .validate()
                .is_err()
        );
    }
}
