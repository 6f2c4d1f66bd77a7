//! Minimal NFO document model
//!
//! Flattens a Kodi-style NFO into the list of its elements in document order,
//! each addressed by its slash-separated path below the root element
//! (`title`, `actor/name`, `ratings/rating/value`). Lookups mirror the handful
//! of queries the NFO extractor needs; nothing else of the XML is kept.

use crate::types::ExtractionError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    path: String,
    attributes: Vec<(String, String)>,
    text: String,
}

/// Parsed NFO content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfoDocument {
    root: String,
    elements: Vec<Element>,
}

impl NfoDocument {
    /// Parse NFO text; surrounding whitespace is ignored
    pub fn parse(content: &str) -> Result<Self, ExtractionError> {
        let mut reader = Reader::from_str(content.trim());
        reader.config_mut().trim_text(true);

        let mut root: Option<String> = None;
        let mut elements: Vec<Element> = Vec::new();
        // Open elements below the root: (name, index into `elements`)
        let mut open: Vec<(String, usize)> = Vec::new();
        let mut depth = 0usize;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = element_name(&e);
                    if root.is_none() {
                        root = Some(name);
                    } else if depth > 0 {
                        let element = new_element(&open, &name, &e);
                        elements.push(element);
                        open.push((name, elements.len() - 1));
                    }
                    depth += 1;
                }
                Ok(Event::Empty(e)) => {
                    let name = element_name(&e);
                    if root.is_none() {
                        root = Some(name);
                    } else if depth > 0 {
                        elements.push(new_element(&open, &name, &e));
                    }
                }
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    open.pop();
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| ExtractionError::Parse(format!("XML text error: {}", e)))?;
                    append_text(&mut elements, &open, &text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    append_text(&mut elements, &open, &text);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ExtractionError::Parse(format!("XML parse error: {}", e)));
                }
                _ => {}
            }
            buf.clear();
        }

        if depth > 0 {
            return Err(ExtractionError::Parse(
                "XML parse error: unexpected end of document".to_string(),
            ));
        }

        let root =
            root.ok_or_else(|| ExtractionError::Parse("XML parse error: no root element".to_string()))?;

        Ok(Self { root, elements })
    }

    /// Name of the root element (`movie`, `episodedetails`, ...)
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Trimmed text of the first element at `path`, if non-blank
    pub fn text(&self, path: &str) -> Option<String> {
        self.elements
            .iter()
            .find(|e| e.path == path)
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// First non-blank text among `paths`, in order
    pub fn first_text(&self, paths: &[&str]) -> Option<String> {
        paths.iter().find_map(|p| self.text(p))
    }

    /// Non-blank texts of every element at `path`
    pub fn all_text(&self, path: &str) -> Vec<String> {
        self.elements
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Attribute `name` of the first element at `path`
    pub fn attribute(&self, path: &str, name: &str) -> Option<String> {
        self.elements
            .iter()
            .find(|e| e.path == path)
            .and_then(|e| e.attributes.iter().find(|(k, _)| k == name))
            .map(|(_, v)| v.clone())
    }

    /// Non-blank texts of elements at `path` whose attribute `name` equals `value`
    pub fn all_text_where(&self, path: &str, name: &str, value: &str) -> Vec<String> {
        self.elements
            .iter()
            .filter(|e| e.path == path)
            .filter(|e| e.attributes.iter().any(|(k, v)| k == name && v == value))
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn new_element(open: &[(String, usize)], name: &str, e: &BytesStart<'_>) -> Element {
    let mut path: Vec<&str> = open.iter().map(|(n, _)| n.as_str()).collect();
    path.push(name);

    let attributes = e
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            (key, value)
        })
        .collect();

    Element {
        path: path.join("/"),
        attributes,
        text: String::new(),
    }
}

fn append_text(elements: &mut [Element], open: &[(String, usize)], text: &str) {
    if let Some((_, index)) = open.last() {
        if let Some(element) = elements.get_mut(*index) {
            element.text.push_str(text);
        }
    }
}
