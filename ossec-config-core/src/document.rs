//! In-memory configuration document.

use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::xml::{BlockPath, Descendants, Element, Node, parse_nodes, write_nodes};

/// Parsed configuration file: the ordered list of its top-level nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigDocument {
    nodes: Vec<Node>,
}

impl ConfigDocument {
    /// Parse XML text. `origin` names the source in error messages.
    pub fn parse(source: &str, origin: &str) -> Result<Self> {
        Ok(Self {
            nodes: parse_nodes(source, origin)?,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root_elements(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(Node::as_element)
    }

    /// Every element in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants::new(&self.nodes)
    }

    /// Every element called `name`, anywhere in the document.
    pub fn elements_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |element| element.name() == name)
    }

    /// Resolve `path` to the first element, in document order, that completes it.
    pub fn find(&self, path: &BlockPath) -> Option<&Element> {
        let trail = trail_for_path(&self.nodes, path.segments())?;
        element_at(&self.nodes, &trail)
    }

    pub fn find_mut(&mut self, path: &BlockPath) -> Option<&mut Element> {
        let trail = trail_for_path(&self.nodes, path.segments())?;
        element_at_mut(&mut self.nodes, &trail)
    }

    /// First element matching `predicate`, in document order.
    pub fn find_where_mut(&mut self, predicate: impl Fn(&Element) -> bool) -> Option<&mut Element> {
        let trail = trail_where(&self.nodes, &predicate)?;
        element_at_mut(&mut self.nodes, &trail)
    }

    /// Detach the first element matching `predicate` from its parent.
    pub fn remove_first_where(
        &mut self,
        predicate: impl Fn(&Element) -> bool,
    ) -> Option<Element> {
        let trail = trail_where(&self.nodes, &predicate)?;
        remove_at(&mut self.nodes, &trail)
    }

    /// First top-level element called `name`.
    pub fn root_block_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.nodes
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|element| element.name() == name)
    }

    /// Remove every element named `segments.last()` whose parent resolves
    /// through the leading segments; returns how many were removed.
    pub(crate) fn remove_all_at(&mut self, path: &BlockPath) -> usize {
        let leaf = path.leaf();
        let parent_segments = path.parent_segments();
        if parent_segments.is_empty() {
            let before = self.nodes.len();
            self.nodes
                .retain(|node| !matches!(node, Node::Element(element) if element.name() == leaf));
            return before - self.nodes.len();
        }

        match trail_for_path(&self.nodes, parent_segments)
            .and_then(|trail| element_at_mut(&mut self.nodes, &trail))
        {
            Some(parent) => parent.remove_children_named(leaf),
            None => 0,
        }
    }

    /// Walk `segments` from the top level, creating missing elements along the
    /// way, and run `apply` on the final one.
    pub(crate) fn with_path_created<R>(
        &mut self,
        segments: &[String],
        apply: impl FnOnce(&mut Element) -> R,
    ) -> Option<R> {
        let (first, rest) = segments.split_first()?;
        if self.root_block_mut(first).is_none() {
            self.nodes.push(Node::Element(Element::new(first.as_str())));
        }
        let root = self.root_block_mut(first)?;

        let mut apply = Some(apply);
        let mut result = None;
        descend_creating(root, rest, &mut |element| {
            if let Some(apply) = apply.take() {
                result = Some(apply(element));
            }
        });
        result
    }

    /// Fold every top-level `name` element into the first one.
    ///
    /// Returns the number of blocks that were merged away.
    pub fn consolidate_root_blocks(&mut self, name: &str) -> usize {
        let mut primary: Option<usize> = None;
        let mut moved: Vec<Node> = Vec::new();
        let mut merged = 0;

        let nodes = std::mem::take(&mut self.nodes);
        for node in nodes {
            match node {
                Node::Element(mut element) if element.name() == name => {
                    if primary.is_none() {
                        primary = Some(self.nodes.len());
                        self.nodes.push(Node::Element(element));
                    } else {
                        moved.extend(element.take_children());
                        merged += 1;
                    }
                }
                other => self.nodes.push(other),
            }
        }

        if let Some(Node::Element(target)) = primary.and_then(|index| self.nodes.get_mut(index)) {
            for node in moved {
                target.push_node(node);
            }
        }

        if merged > 0 {
            tracing::debug!(block = name, merged, "consolidated root blocks");
        }
        merged
    }

    /// Serialize with `indent` spaces per nesting level.
    pub fn render(&self, indent: usize) -> Result<String> {
        write_nodes(&self.nodes, indent)
            .map_err(|err| ConfigError::io("serializing", "<document>", err))
    }
}

impl FromStr for ConfigDocument {
    type Err = ConfigError;

    fn from_str(source: &str) -> Result<Self> {
        Self::parse(source, "<memory>")
    }
}

fn descend_creating(
    element: &mut Element,
    segments: &[String],
    apply: &mut dyn FnMut(&mut Element),
) {
    match segments.split_first() {
        None => apply(element),
        Some((next, rest)) => {
            element.with_child(next, |child| descend_creating(child, rest, apply))
        }
    }
}

/// Index trail to the first element that completes `segments`.
fn trail_for_path(nodes: &[Node], segments: &[String]) -> Option<Vec<usize>> {
    let (first, rest) = segments.split_first()?;
    for (index, node) in nodes.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };
        if element.name() != first {
            continue;
        }
        if rest.is_empty() {
            return Some(vec![index]);
        }
        if let Some(mut tail) = trail_for_path(element.children(), rest) {
            tail.insert(0, index);
            return Some(tail);
        }
    }
    None
}

fn trail_where(nodes: &[Node], predicate: &impl Fn(&Element) -> bool) -> Option<Vec<usize>> {
    for (index, node) in nodes.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };
        if predicate(element) {
            return Some(vec![index]);
        }
        if let Some(mut tail) = trail_where(element.children(), predicate) {
            tail.insert(0, index);
            return Some(tail);
        }
    }
    None
}

fn element_at<'a>(nodes: &'a [Node], trail: &[usize]) -> Option<&'a Element> {
    let (first, rest) = trail.split_first()?;
    let element = nodes.get(*first)?.as_element()?;
    if rest.is_empty() {
        Some(element)
    } else {
        element_at(element.children(), rest)
    }
}

fn element_at_mut<'a>(nodes: &'a mut [Node], trail: &[usize]) -> Option<&'a mut Element> {
    let (first, rest) = trail.split_first()?;
    let element = nodes.get_mut(*first)?.as_element_mut()?;
    if rest.is_empty() {
        Some(element)
    } else {
        element_at_mut(element.children_mut(), rest)
    }
}

fn remove_at(nodes: &mut Vec<Node>, trail: &[usize]) -> Option<Element> {
    match trail {
        [] => None,
        [index] => {
            if !matches!(nodes.get(*index), Some(Node::Element(_))) {
                return None;
            }
            match nodes.remove(*index) {
                Node::Element(element) => Some(element),
                _ => None,
            }
        }
        [first, rest @ ..] => {
            let parent = nodes.get_mut(*first)?.as_element_mut()?;
            remove_at(parent.children_mut(), rest)
        }
    }
}
