use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::tree::{Element, Node};
use crate::error::{ConfigError, Result};

/// Parse `source` into its top-level nodes.
///
/// OSSEC files usually hold several sibling `<ossec_config>` roots, so more
/// than one top-level element is accepted. Whitespace-only text is dropped
/// and remaining text is trimmed.
pub(crate) fn parse_nodes(source: &str, origin: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(source);
    let config = reader.config_mut();
    config.trim_text(true);
    config.expand_empty_elements = true;

    let mut top_level: Vec<Node> = Vec::new();
    let mut open: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|err| {
            ConfigError::parse(
                origin,
                format!("{err} (near byte {})", reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(start) => open.push(element_from(&start, origin)?),
            Event::Empty(start) => {
                let element = element_from(&start, origin)?;
                attach(&mut open, &mut top_level, Node::Element(element));
            }
            Event::End(end) => {
                let Some(element) = open.pop() else {
                    return Err(ConfigError::parse(
                        origin,
                        format!(
                            "unexpected closing tag '{}'",
                            String::from_utf8_lossy(end.name().as_ref())
                        ),
                    ));
                };
                attach(&mut open, &mut top_level, Node::Element(element));
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|err| ConfigError::parse(origin, err.to_string()))?;
                if !text.trim().is_empty() {
                    attach(&mut open, &mut top_level, Node::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                let data = utf8(&data, origin)?;
                attach(&mut open, &mut top_level, Node::CData(data));
            }
            Event::Comment(comment) => {
                let comment = utf8(&comment, origin)?;
                attach(&mut open, &mut top_level, Node::Comment(comment));
            }
            Event::Decl(decl) => {
                let decl = utf8(&decl, origin)?;
                attach(&mut open, &mut top_level, Node::ProcessingInstruction(decl));
            }
            Event::PI(instruction) => {
                let instruction = utf8(&instruction, origin)?;
                attach(
                    &mut open,
                    &mut top_level,
                    Node::ProcessingInstruction(instruction),
                );
            }
            Event::DocType(doctype) => {
                let doctype = utf8(&doctype, origin)?;
                attach(&mut open, &mut top_level, Node::DocType(doctype.trim().to_string()));
            }
            Event::Eof => break,
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(ConfigError::parse(
            origin,
            format!("element '{}' is never closed", unclosed.name()),
        ));
    }

    if !top_level.iter().any(|node| matches!(node, Node::Element(_))) {
        return Err(ConfigError::parse(origin, "document contains no elements"));
    }

    Ok(top_level)
}

fn attach(open: &mut [Element], top_level: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.push_node(node),
        None => top_level.push(node),
    }
}

fn element_from(start: &BytesStart<'_>, origin: &str) -> Result<Element> {
    let mut element = Element::new(utf8(start.name().as_ref(), origin)?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| ConfigError::parse(origin, err.to_string()))?;
        let key = utf8(attribute.key.as_ref(), origin)?;
        let value = attribute
            .unescape_value()
            .map_err(|err| ConfigError::parse(origin, err.to_string()))?;
        element.set_attribute(key, value.into_owned());
    }
    Ok(element)
}

fn utf8(bytes: &[u8], origin: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| ConfigError::parse(origin, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_multiple_roots_and_comments() {
        let nodes = parse_nodes(
            "<!-- header -->\n<ossec_config><a>1</a></ossec_config>\n<ossec_config/>",
            "test",
        )
        .expect("parse");

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.first(), Some(&Node::Comment(" header ".to_string())));
        let roots: Vec<&str> = nodes
            .iter()
            .filter_map(Node::as_element)
            .map(Element::name)
            .collect();
        assert_eq!(roots, vec!["ossec_config", "ossec_config"]);
    }

    #[test]
    fn drops_insignificant_whitespace() {
        let nodes = parse_nodes("<a>\n   <b>  x y </b>\n</a>", "test").expect("parse");
        let root = nodes.first().and_then(Node::as_element).expect("root");
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.child_text("b").as_deref(), Some("x y"));
    }

    #[test]
    fn unescapes_text_and_attributes() {
        let nodes = parse_nodes(
            r#"<a name="x &amp; y"><b>1 &lt; 2</b></a>"#,
            "test",
        )
        .expect("parse");
        let root = nodes.first().and_then(Node::as_element).expect("root");
        assert_eq!(root.attribute("name"), Some("x & y"));
        assert_eq!(root.child_text("b").as_deref(), Some("1 < 2"));
    }

    #[test]
    fn rejects_malformed_documents() {
        for source in ["<a><b></a>", "<a>", "", "   ", "</a>"] {
            let err = parse_nodes(source, "broken.conf").expect_err(source);
            assert!(err.is_parse(), "{source:?} gave {err}");
        }
    }
}
