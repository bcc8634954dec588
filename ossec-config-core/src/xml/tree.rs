use crate::error::{ConfigError, Result};

/// A single node of the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    /// Processing instruction content between `<?` and `?>`, including the
    /// XML declaration.
    ProcessingInstruction(String),
    DocType(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create `<name>text</name>`.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.set_text(text);
        element
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping its position when it already exists.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(existing, _)| existing == key)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First direct child element called `name`.
    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|child| child.name == name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|child| child.name == name)
    }

    /// Run `apply` on the first child called `name`, appending a new empty
    /// child first when there is none.
    pub fn with_child<R>(&mut self, name: &str, apply: impl FnOnce(&mut Element) -> R) -> R {
        if let Some(child) = self.find_child_mut(name) {
            return apply(child);
        }

        let mut child = Element::new(name);
        let result = apply(&mut child);
        self.push_element(child);
        result
    }

    /// Text directly inside this element, or `None` when it has no text nodes.
    pub fn text(&self) -> Option<String> {
        let mut text: Option<String> = None;
        for node in &self.children {
            if let Node::Text(value) | Node::CData(value) = node {
                text.get_or_insert_with(String::new).push_str(value);
            }
        }
        text
    }

    /// Text of the first child called `name`.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.find_child(name).and_then(Element::text)
    }

    /// Replace the element's text while keeping child elements and comments.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        let text = text.into();
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text));
        }
    }

    pub fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    pub fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Remove every direct child element called `name`; returns how many went.
    pub fn remove_children_named(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(child) if child.name == name));
        before - self.children.len()
    }

    /// Take every child node, leaving the element empty.
    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Pre-order walk over every element below this one.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(&self.children)
    }
}

/// Depth-first, document-order iterator over elements.
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Descendants<'a> {
    pub(crate) fn new(nodes: &'a [Node]) -> Self {
        Self {
            stack: vec![nodes.iter()],
        }
    }
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(level) = self.stack.last_mut() {
            match level.next() {
                Some(Node::Element(element)) => {
                    self.stack.push(element.children.iter());
                    return Some(element);
                }
                Some(_) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// Check that `name` can be written as an XML element or attribute name.
pub fn validate_name(field: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(ConfigError::validation(field, "name must not be empty"));
    };

    if !(first.is_alphabetic() || first == '_' || first == ':') {
        return Err(ConfigError::validation(
            field,
            format!("'{name}' must start with a letter or underscore"),
        ));
    }

    if let Some(bad) =
        chars.find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(ConfigError::validation(
            field,
            format!("'{name}' contains unsupported character '{bad}'"),
        ));
    }

    if name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml"))
    {
        return Err(ConfigError::validation(
            field,
            format!("'{name}' uses the reserved 'xml' prefix"),
        ));
    }

    Ok(())
}
