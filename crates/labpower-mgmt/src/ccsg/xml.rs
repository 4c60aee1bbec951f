//! CC-SG response parsing
//!
//! Responses are matched by local element name, so the namespace prefixes
//! the appliance picks do not matter.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{PowerError, Result};

/// Element of a parsed response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name, prefix stripped
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn start(e: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            ..Default::default()
        }
    }

    /// Parse a complete document into its root element
    pub fn parse(xml: &str) -> Result<Element> {
        parse_tree(xml).map_err(|detail| {
            debug!(%detail, "Rejecting CC-SG response");
            PowerError::power("Cannot parse response into XML")
        })
    }

    /// First element named `name`, depth-first in document order
    ///
    /// The element itself is checked before its children.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

fn parse_tree(xml: &str) -> std::result::Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if root.is_some() {
                    return Err("content after the root element".to_string());
                }
                stack.push(Element::start(&e));
            }
            Ok(Event::Empty(e)) => {
                let element = Element::start(&e);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err("content after the root element".to_string()),
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without an open element".to_string())?;
                if e.local_name().as_ref() != element.name.as_bytes() {
                    return Err(format!("mismatched closing tag for <{}>", element.name));
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "empty document".to_string())
}

/// Text of the first element named `key`
pub fn get_value_from_response(xml: &str, key: &str) -> Result<String> {
    let root = Element::parse(xml)?;
    root.find(key)
        .map(|element| element.text.clone())
        .ok_or_else(|| PowerError::power(format!("Not found key '{}' in response.", key)))
}

/// Ids of every `interfacesData` block whose `type` contains `keyword`
///
/// The match ignores case and results keep document order. Appliances
/// have been seen to emit stray closing tags inside the node listing, so
/// the scan does not require a well-formed document.
pub fn extract_device_ids(xml: &str, keyword: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let keyword = keyword.to_lowercase();
    let mut ids = Vec::new();
    let mut block: Option<InterfaceBlock> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"interfacesData" => block = Some(InterfaceBlock::default()),
                b"id" if block.is_some() => field = Some(Field::Id),
                b"type" if block.is_some() => field = Some(Field::Type),
                _ => field = None,
            },
            Ok(Event::Text(e)) => {
                if let (Some(current), Some(which)) = (block.as_mut(), field) {
                    let text = e.unescape().map_err(|_| parse_error())?;
                    match which {
                        Field::Id => current.id.push_str(&text),
                        Field::Type => current.kind.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if e.local_name().as_ref() == b"interfacesData" {
                    if let Some(done) = block.take() {
                        if done.kind.to_lowercase().contains(&keyword) && !done.id.is_empty() {
                            ids.push(done.id);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Rejecting CC-SG node listing");
                return Err(parse_error());
            }
        }
    }

    Ok(ids)
}

#[derive(Debug, Default)]
struct InterfaceBlock {
    id: String,
    kind: String,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Type,
}

fn parse_error() -> PowerError {
    PowerError::power("Cannot parse response into XML")
}
