use std::io;

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::tree::{Element, Node};
use crate::error::{ConfigError, Result};

/// Serialize nodes, indenting nested elements by `indent` spaces.
pub(crate) fn write_nodes(nodes: &[Node], indent: usize) -> io::Result<String> {
    let mut writer = if indent == 0 {
        Writer::new(Vec::new())
    } else {
        Writer::new_with_indent(Vec::new(), b' ', indent)
    };

    for node in nodes {
        write_node(&mut writer, node)?;
    }

    let mut rendered = String::from_utf8(writer.into_inner()).map_err(io::Error::other)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Serialize a single element and its subtree.
pub(crate) fn render_element(element: &Element, indent: usize) -> Result<String> {
    write_nodes(&[Node::Element(element.clone())], indent)
        .map_err(|err| ConfigError::io("serializing", element.name(), err))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> io::Result<()> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => emit(
            writer,
            Event::Text(BytesText::from_escaped(partial_escape(text))),
        ),
        Node::CData(data) => emit(writer, Event::CData(BytesCData::new(data.as_str()))),
        Node::Comment(comment) => emit(
            writer,
            Event::Comment(BytesText::from_escaped(comment.as_str())),
        ),
        Node::ProcessingInstruction(content) => {
            // Declarations and other instructions share the `<?..?>` framing.
            let target_len = content
                .find(char::is_whitespace)
                .unwrap_or(content.len());
            let start = BytesStart::from_content(content.as_str(), target_len);
            emit(writer, Event::Decl(BytesDecl::from_start(start)))
        }
        Node::DocType(doctype) => emit(
            writer,
            Event::DocType(BytesText::from_escaped(doctype.as_str())),
        ),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> io::Result<()> {
    let mut start = BytesStart::new(element.name());
    for (key, value) in element.attributes() {
        start.push_attribute((key, value));
    }

    if element.children().is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for child in element.children() {
        write_node(writer, child)?;
    }
    emit(writer, Event::End(BytesEnd::new(element.name())))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> io::Result<()> {
    writer
        .write_event(event)
        .map_err(|err| io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::parse::parse_nodes;
    use super::*;

    #[test]
    fn writes_nested_elements_with_indentation() {
        let mut integration = Element::new("integration");
        integration.push_element(Element::with_text("name", "slack"));
        integration.push_element(Element::with_text("level", "12"));
        let mut root = Element::new("ossec_config");
        root.push_element(integration);

        let rendered = write_nodes(&[Node::Element(root)], 2).expect("write");
        assert!(rendered.contains("<name>slack</name>"), "{rendered}");
        assert!(rendered.contains("\n    <level>12</level>"), "{rendered}");
        assert!(rendered.ends_with("</ossec_config>\n"), "{rendered}");
    }

    #[test]
    fn output_parses_back_to_the_same_tree() {
        let source = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- Wazuh -->
<ossec_config>
  <localfile location="a &amp; b"><log_format>syslog</log_format></localfile>
  <command><expect>a &lt; b</expect><flag/></command>
</ossec_config>"#;
        let nodes = parse_nodes(source, "test").expect("parse");
        let rendered = write_nodes(&nodes, 2).expect("write");
        let reparsed = parse_nodes(&rendered, "test").expect("reparse");
        assert_eq!(nodes, reparsed);
        assert!(rendered.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }

    #[test]
    fn empty_elements_are_self_closing() {
        let rendered = write_nodes(&[Node::Element(Element::new("flag"))], 2).expect("write");
        assert_eq!(rendered, "<flag/>\n");
    }
}
