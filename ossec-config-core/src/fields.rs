use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::xml::Element;

/// Ordered `child tag -> text` view of a flat block such as `<integration>`
/// or `<command>`.
///
/// Child elements without text map to an empty string. When a tag repeats,
/// the last value wins but the tag keeps its first position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(IndexMap<String, String>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_element(element: &Element) -> Self {
        element
            .child_elements()
            .map(|child| (child.name().to_string(), child.text().unwrap_or_default()))
            .collect()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, String> {
        self.0
    }
}

impl<K, V> FromIterator<(K, V)> for FieldSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for FieldSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for FieldSet {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_tags_keep_first_position() {
        let mut element = Element::new("integration");
        element.push_element(Element::with_text("name", "slack"));
        element.push_element(Element::with_text("level", "10"));
        element.push_element(Element::with_text("name", "custom"));
        element.push_element(Element::new("group"));

        let fields = FieldSet::from_element(&element);
        let entries: Vec<(&str, &str)> = fields.iter().collect();
        assert_eq!(entries, vec![("name", "custom"), ("level", "10"), ("group", "")]);
    }

    #[test]
    fn serializes_as_a_plain_map() {
        let fields = FieldSet::from([("name", "slack"), ("level", "12")]);
        let json = serde_json::to_string(&fields).expect("json");
        assert_eq!(json, r#"{"name":"slack","level":"12"}"#);
    }
}
