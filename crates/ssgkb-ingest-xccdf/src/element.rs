//! Minimal owned element tree for a single decoded subtree.

use crate::normalize::{escape_text, normalize_markup};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use ssgkb_model::{SsgError, SsgResult};
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Escaped text, ready to be re-emitted as markup.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `xccdf-1.2:Rule`.
    pub name: String,
    pub local_name: String,
    /// `(local name, unescaped value)` pairs.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let local_name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push((key, value));
        }
        Self {
            name,
            local_name,
            attributes,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_named<'s>(&'s self, local: &'s str) -> impl Iterator<Item = &'s XmlElement> {
        self.elements().filter(move |el| el.local_name == local)
    }

    pub fn first(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name == local)
    }

    /// Markup of the children with attributes dropped.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.write_markup(&mut out);
        }
        out
    }

    /// Normalised plain text of this element's content.
    pub fn text(&self) -> String {
        normalize_markup(&self.inner_xml())
    }

    /// Normalised text of the first child called `local`, or empty.
    pub fn child_text(&self, local: &str) -> String {
        self.first(local).map(XmlElement::text).unwrap_or_default()
    }
}

impl XmlNode {
    fn write_markup(&self, out: &mut String) {
        match self {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(el) if el.children.is_empty() => {
                out.push('<');
                out.push_str(&el.name);
                out.push_str("/>");
            }
            XmlNode::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                out.push('>');
                for child in &el.children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

fn xml_error(err: quick_xml::Error, position: usize) -> SsgError {
    SsgError::invalid(format!("malformed XML at byte {position}: {err}"))
}

/// Reads events up to the end tag matching `root` and returns the finished
/// subtree. The reader is left positioned right after that end tag.
pub fn read_subtree<R: BufRead>(
    reader: &mut Reader<R>,
    root: XmlElement,
    buf: &mut Vec<u8>,
) -> SsgResult<XmlElement> {
    let mut stack = vec![root];
    loop {
        buf.clear();
        let event = reader
            .read_event_into(buf)
            .map_err(|e| xml_error(e, reader.buffer_position()))?;
        match event {
            Event::Start(e) => stack.push(XmlElement::from_start(&e)),
            Event::Empty(e) => {
                let el = XmlElement::from_start(&e);
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Element(el));
                }
            }
            Event::Text(e) => {
                let raw = e.into_inner();
                // raw text never holds `<`; a literal `>` is legal XML and re-escaped here
                let text = String::from_utf8_lossy(&raw).replace('>', "&gt;");
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Text(text));
                }
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = escape_text(&String::from_utf8_lossy(&raw));
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Text(text));
                }
            }
            Event::End(_) => {
                let Some(done) = stack.pop() else {
                    return Err(SsgError::invalid("unbalanced end tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(done)),
                    None => return Ok(done),
                }
            }
            Event::Eof => {
                return Err(SsgError::invalid(format!(
                    "unexpected end of file inside <{}>",
                    stack.first().map(|el| el.name.as_str()).unwrap_or("?")
                )))
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlElement {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) => {
                    let root = XmlElement::from_start(&e);
                    return read_subtree(&mut reader, root, &mut buf).unwrap();
                }
                Event::Eof => panic!("no root"),
                _ => {}
            }
            buf.clear();
        }
    }

    #[test]
    fn builds_tree_and_reads_attributes() {
        let el = parse(
            r#"<x:Rule id="r1" severity="high"><x:title>Title &amp; more</x:title><x:ident system="s">CCE-1-2</x:ident></x:Rule>"#,
        );
        assert_eq!(el.local_name, "Rule");
        assert_eq!(el.attr("id"), Some("r1"));
        assert_eq!(el.child_text("title"), "Title & more");
        assert_eq!(el.first("ident").and_then(|i| i.attr("system")), Some("s"));
        assert_eq!(el.elements().count(), 2);
    }

    #[test]
    fn cdata_and_literal_gt_stay_escaped() {
        let el = parse("<d>a > b <![CDATA[<tag>]]></d>");
        assert_eq!(el.text(), "a &gt; b &lt;tag&gt;");
    }

    #[test]
    fn truncated_input_is_invalid() {
        let mut reader = Reader::from_str("<a><b>");
        let mut buf = Vec::new();
        let Event::Start(e) = reader.read_event_into(&mut buf).unwrap() else {
            panic!("expected start");
        };
        let root = XmlElement::from_start(&e);
        assert!(matches!(
            read_subtree(&mut reader, root, &mut buf),
            Err(SsgError::InvalidFormat(_))
        ));
    }
}
