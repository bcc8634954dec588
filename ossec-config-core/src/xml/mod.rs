//! Owned XML tree used to hold a configuration file in memory.
//!
//! Parsing and serialization go through `quick-xml`; the tree itself only
//! keeps what an editor needs: element names, ordered attributes, and
//! children (elements, text, comments, CDATA and processing instructions).

mod parse;
mod path;
mod tree;
mod write;

pub(crate) use parse::parse_nodes;
pub use path::BlockPath;
pub use tree::{Descendants, Element, Node, validate_name};
pub(crate) use write::{render_element, write_nodes};
