//! Builds a lightweight element tree from template markup.
//!
//! Templates are XHTML-ish rather than strict XML: end tags may be missing
//! or mismatched and HTML void elements are rarely self-closed. The builder
//! is lenient about all of that but keeps the exact source line of every
//! element, attribute and text node.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::extractors::LineIndex;
use crate::logging;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name as written, e.g. `i18n:translate`
    pub name: String,
    /// Raw value, entities not decoded
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub line: usize,
}

impl Element {
    fn new(name: String, attributes: Vec<Attribute>, line: usize) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text { text: String, line: usize },
    Comment { line: usize },
    CData { text: String, line: usize },
    ProcessingInstruction { line: usize },
    Declaration { line: usize },
    DocType { line: usize },
}

/// Parse `source` into its top level nodes.
pub fn parse_document(source: &str, filename: &str) -> Result<Vec<Node>, ExtractError> {
    let lines = LineIndex::new(source);
    let mut reader = Reader::from_str(source);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    // Open elements; the first entry is a synthetic document root.
    let mut stack = vec![Element::new(String::new(), Vec::new(), 1)];

    loop {
        let start = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let position = reader.error_position() as usize;
                return Err(ExtractError::parse(
                    filename,
                    lines.line_of(position),
                    err.to_string(),
                ));
            }
        };
        let end = reader.buffer_position() as usize;
        let line = lines.line_of(start);
        let raw = source.get(start..end).unwrap_or_default();

        let node = match event {
            Event::Start(tag) | Event::Empty(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                let attributes = read_attributes(&tag, raw, start, &lines, filename)?;
                let element = Element::new(name, attributes, line);
                let self_closing = raw.ends_with("/>") || is_void(&element.name);
                if self_closing {
                    Node::Element(element)
                } else {
                    stack.push(element);
                    continue;
                }
            }
            Event::End(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
                close_element(&mut stack, &name, filename, line);
                continue;
            }
            Event::Text(_) => Node::Text {
                text: raw.to_string(),
                line,
            },
            Event::CData(data) => Node::CData {
                text: String::from_utf8_lossy(&data.into_inner()).into_owned(),
                line,
            },
            Event::Comment(_) => Node::Comment { line },
            Event::PI(_) => Node::ProcessingInstruction { line },
            Event::Decl(_) => Node::Declaration { line },
            Event::DocType(_) => Node::DocType { line },
            Event::Eof => break,
            #[allow(unreachable_patterns)]
            _ => {
                logging::warn(&format!(
                    "{}[{}]: skipping unsupported markup node",
                    filename, line
                ));
                continue;
            }
        };
        if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }

    // Elements still open at the end of input are closed implicitly.
    while stack.len() > 1 {
        if let Some(element) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(element));
            }
        }
    }
    Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

fn is_void(name: &str) -> bool {
    !name.contains(':') && VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

/// Pop up to and including the innermost open element called `name`.
/// End tags without a matching open element are ignored.
fn close_element(stack: &mut Vec<Element>, name: &str, filename: &str, line: usize) {
    let Some(position) = stack.iter().skip(1).rposition(|element| element.name == name) else {
        logging::debug(&format!(
            "{}[{}]: ignoring unmatched end tag </{}>",
            filename, line, name
        ));
        return;
    };
    let target = position + 1;
    while stack.len() > target {
        if let Some(element) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(Node::Element(element));
            }
        }
    }
}

fn read_attributes(
    tag: &quick_xml::events::BytesStart<'_>,
    raw: &str,
    tag_offset: usize,
    lines: &LineIndex,
    filename: &str,
) -> Result<Vec<Attribute>, ExtractError> {
    let mut attributes = Vec::new();
    let mut search_from = 0;
    for attribute in tag.html_attributes().with_checks(false) {
        let attribute = attribute.map_err(|err| {
            ExtractError::parse(filename, lines.line_of(tag_offset), err.to_string())
        })?;
        let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attribute.value).into_owned();

        let offset = match find_attribute_name(raw, search_from, &name) {
            Some(idx) => {
                search_from = idx + name.len();
                tag_offset + idx
            }
            None => tag_offset,
        };
        attributes.push(Attribute {
            name,
            value,
            line: lines.line_of(offset),
        });
    }
    Ok(attributes)
}

/// Position of attribute `name` in a raw tag: preceded by whitespace and
/// followed by `=`, whitespace or the end of the tag.
fn find_attribute_name(raw: &str, from: usize, name: &str) -> Option<usize> {
    let mut search_from = from;
    while let Some(idx) = raw.get(search_from..)?.find(name) {
        let start = search_from + idx;
        let end = start + name.len();
        let before = raw[..start].chars().next_back();
        let after = raw[end..].chars().next();
        let ends_name = match after {
            Some(ch) => ch == '=' || ch == '/' || ch == '>' || ch.is_whitespace(),
            None => true,
        };
        if before.is_some_and(char::is_whitespace) && ends_name {
            return Some(start);
        }
        search_from = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(nodes: &[Node], index: usize) -> &Element {
        let elements: Vec<&Element> = nodes
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .collect();
        elements[index]
    }

    #[test]
    fn test_nested_elements_and_lines() {
        let source = "<html>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>\n";
        let nodes = parse_document(source, "page.pt").unwrap();
        let html = element(&nodes, 0);
        assert_eq!(html.line, 1);
        let body = element(&html.children, 0);
        assert_eq!(body.line, 2);
        let p = element(&body.children, 0);
        assert_eq!(p.line, 3);
        assert_eq!(
            p.children,
            vec![Node::Text {
                text: "Hello".into(),
                line: 3
            }]
        );
    }

    #[test]
    fn test_multiline_attributes() {
        let source = "<div\n  title=\"a\"\n  i18n:attributes=\"title\">x</div>";
        let nodes = parse_document(source, "page.pt").unwrap();
        let div = element(&nodes, 0);
        assert_eq!(div.line, 1);
        assert_eq!(div.attributes[0].name, "title");
        assert_eq!(div.attributes[0].line, 2);
        assert_eq!(div.attributes[1].name, "i18n:attributes");
        assert_eq!(div.attributes[1].line, 3);
    }

    #[test]
    fn test_attribute_line_ignores_names_inside_values() {
        let source = "<p i18n:attributes=\"title; alt\" title=\"x\"\n   alt=\"y\"/>";
        let nodes = parse_document(source, "page.pt").unwrap();
        let p = element(&nodes, 0);
        assert_eq!(p.attributes[1].line, 1);
        assert_eq!(p.attributes[2].name, "alt");
        assert_eq!(p.attributes[2].line, 2);
    }

    #[test]
    fn test_comment_and_cdata_advance_lines() {
        let source = "<!-- one\ntwo -->\n<![CDATA[\n]]>\n<p/>";
        let nodes = parse_document(source, "page.pt").unwrap();
        assert_eq!(element(&nodes, 0).line, 5);
    }

    #[test]
    fn test_void_and_unclosed_elements() {
        let source = "<p>one<br>two</p><span>open";
        let nodes = parse_document(source, "page.pt").unwrap();
        let p = element(&nodes, 0);
        assert_eq!(p.children.len(), 3);
        let span = element(&nodes, 1);
        assert_eq!(span.name, "span");
    }

    #[test]
    fn test_mismatched_end_tag_closes_inner_elements() {
        let source = "<div><p>text</div><em>after</em>";
        let nodes = parse_document(source, "page.pt").unwrap();
        let div = element(&nodes, 0);
        assert_eq!(element(&div.children, 0).name, "p");
        assert_eq!(element(&nodes, 1).name, "em");
    }

    #[test]
    fn test_raw_values_are_kept() {
        let source = "<a title=\"Tom &amp; Jerry\">Tom &amp; Jerry</a>";
        let nodes = parse_document(source, "page.pt").unwrap();
        let a = element(&nodes, 0);
        assert_eq!(a.attributes[0].value, "Tom &amp; Jerry");
        assert!(matches!(&a.children[0], Node::Text { text, .. } if text == "Tom &amp; Jerry"));
    }
}
