//! Minimal element tree for gateway XML fragments, built on quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::decoder::DecodeError;

/// An XML element with its concatenated text and child elements.
/// Attributes are not used by the gateway and are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element. Content after the
    /// first root element is ignored.
    pub fn parse(document: &str) -> Result<Element, DecodeError> {
        let mut reader = Reader::from_str(document);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Element::from_start(&e)),
                Event::Empty(e) => attach(&mut stack, &mut root, Element::from_start(&e)),
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.first() {
            return Err(DecodeError::Unclosed(open.name.clone()));
        }
        root.ok_or(DecodeError::EmptyDocument)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// Text of a named child, or `MissingField` when the child is absent
    pub fn field(&self, name: &str) -> Result<&str, DecodeError> {
        self.child(name)
            .map(|c| c.text.as_str())
            .ok_or_else(|| DecodeError::MissingField(name.to_string()))
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}
