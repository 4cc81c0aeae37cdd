//! Minimal element tree over a mapping document.
//!
//! The compiler only needs element names, attributes and text content, so the
//! quick-xml event stream is folded into a small owned tree. Namespace prefixes
//! are dropped: `xs:element` and `xsd:element` both surface as `element`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::errors::SchemaParseError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follows a chain of first-matching children, like `annotation/appinfo`.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter()
            .try_fold(self, |element, name| element.child(name))
    }
}

/// Parse `content` into its root element.
pub fn parse_document(content: &str) -> Result<XmlElement, SchemaParseError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| SchemaParseError::Xml {
            position,
            error: e.to_string(),
        })?;

        match event {
            Event::Start(ref e) => {
                stack.push(start_element(e, position)?);
            }
            Event::Empty(ref e) => {
                let element = start_element(e, position)?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| SchemaParseError::Xml {
                    position,
                    error: "unbalanced closing tag".to_string(),
                })?;
                attach(&mut stack, &mut root, element, position)?;
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| SchemaParseError::Xml {
                        position,
                        error: e.to_string(),
                    })?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SchemaParseError::Xml {
            position: reader.buffer_position(),
            error: format!("unclosed element `{}`", stack[stack.len() - 1].name),
        });
    }

    root.ok_or_else(|| SchemaParseError::Xml {
        position: 0,
        error: "document has no root element".to_string(),
    })
}

fn start_element(e: &BytesStart<'_>, position: usize) -> Result<XmlElement, SchemaParseError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SchemaParseError::Xml {
            position,
            error: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| SchemaParseError::Xml {
                position,
                error: err.to_string(),
            })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..Default::default()
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    position: usize,
) -> Result<(), SchemaParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(SchemaParseError::Xml {
            position,
            error: format!("second root element `{}`", element.name),
        });
    }
    *root = Some(element);
    Ok(())
}
