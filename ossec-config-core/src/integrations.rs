//! `<integration>` blocks: external alert forwarders such as Slack,
//! PagerDuty or VirusTotal hooks.

use std::fmt;

use serde::Serialize;

use crate::error::{ConfigError, Result};
use crate::fields::FieldSet;
use crate::manager::ConfigManager;
use crate::xml::{Descendants, Element, validate_name};

pub const INTEGRATION_TAG: &str = "integration";

/// Field map of one `<integration>` element.
///
/// Identity is positional: two entries with identical fields are both kept
/// and both reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Integration {
    fields: FieldSet,
}

impl Integration {
    pub fn from_element(element: &Element) -> Self {
        Self {
            fields: FieldSet::from_element(element),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn hook_url(&self) -> Option<&str> {
        self.get("hook_url")
    }

    pub fn api_key(&self) -> Option<&str> {
        self.get("api_key")
    }

    pub fn level(&self) -> Option<&str> {
        self.get("level")
    }

    pub fn group(&self) -> Option<&str> {
        self.get("group")
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.get("rule_id")
    }

    pub fn alert_format(&self) -> Option<&str> {
        self.get("alert_format")
    }

    /// Slack-style channel override.
    pub fn channel(&self) -> Option<&str> {
        self.get("channel")
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }
}

/// Lazy iterator over the integrations of a document, in document order.
pub struct Integrations<'a> {
    elements: Descendants<'a>,
}

impl Iterator for Integrations<'_> {
    type Item = Integration;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements
            .find(|element| element.name() == INTEGRATION_TAG)
            .map(Integration::from_element)
    }
}

/// Field equalities that pick out one integration.
///
/// Every listed field must be present with exactly the given text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationSelector {
    fields: Vec<(String, String)>,
}

impl IntegrationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new().with_field("name", name)
    }

    pub fn with_hook_url(self, hook_url: impl Into<String>) -> Self {
        self.with_field("hook_url", hook_url)
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A repeated field matches when any of its occurrences has the value.
    pub fn matches(&self, element: &Element) -> bool {
        element.name() == INTEGRATION_TAG
            && self.fields.iter().all(|(field, value)| {
                element.child_elements().any(|child| {
                    child.name() == field && child.text().unwrap_or_default() == *value
                })
            })
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ConfigError::validation(
                "selector",
                "at least one field is required to pick an integration",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for IntegrationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for IntegrationSelector
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |selector, (field, value)| {
                selector.with_field(field, value)
            })
    }
}

fn collect_fields<I, K, V>(fields: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let fields: Vec<(String, String)> = fields
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    for (key, _) in &fields {
        validate_name("integration field", key)?;
    }
    Ok(fields)
}

impl ConfigManager {
    /// Every `<integration>` block, anywhere in the document.
    ///
    /// The iterator borrows the current tree, so it always reflects earlier
    /// edits; call again to start over.
    pub fn read_integrations(&self) -> Integrations<'_> {
        Integrations {
            elements: self.document().descendants(),
        }
    }

    pub fn integration_exists(&self, selector: &IntegrationSelector) -> bool {
        !selector.is_empty()
            && self
                .document()
                .descendants()
                .any(|element| selector.matches(element))
    }

    /// Append a new `<integration>` to the root block with one child per
    /// field, in the order given.
    pub fn insert_integration<I, K, V>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = collect_fields(fields)?;
        if fields.is_empty() {
            return Err(ConfigError::validation(
                "integration",
                "at least one field is required",
            ));
        }

        let mut integration = Element::new(INTEGRATION_TAG);
        for (key, value) in &fields {
            integration.push_element(Element::with_text(key.as_str(), value.as_str()));
        }

        self.root_block_mut()?.push_element(integration);
        tracing::debug!(
            name = fields
                .iter()
                .find(|(key, _)| key == "name")
                .map(|(_, value)| value.as_str()),
            "integration inserted"
        );
        Ok(())
    }

    /// Remove the first integration matching `selector` and return it.
    pub fn delete_integration(&mut self, selector: &IntegrationSelector) -> Result<Integration> {
        selector.ensure_usable()?;
        let removed = self
            .document_mut()
            .remove_first_where(|element| selector.matches(element))
            .ok_or_else(|| ConfigError::not_found("integration", selector.to_string()))?;

        tracing::debug!(selector = %selector, "integration removed");
        Ok(Integration::from_element(&removed))
    }

    /// Set or create fields on the first integration matching `selector`.
    pub fn update_integration<I, K, V>(
        &mut self,
        selector: &IntegrationSelector,
        updates: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        selector.ensure_usable()?;
        let updates = collect_fields(updates)?;

        let integration = self
            .document_mut()
            .find_where_mut(|element| selector.matches(element))
            .ok_or_else(|| ConfigError::not_found("integration", selector.to_string()))?;
        for (key, value) in updates {
            integration.with_child(&key, |child| child.set_text(value));
        }

        tracing::debug!(selector = %selector, "integration updated");
        Ok(())
    }
}
