//! XML tree used for TRIAS responses and requests
//!
//! Responses are read into [`XmlValue`], a nested, key-ordered mapping
//! keyed by local element names (namespace prefixes are dropped). Repeated
//! sibling elements collapse into a [`XmlValue::List`]; the schema allows
//! many containers to hold one *or* many entries, so consumers go through
//! [`XmlValue::as_list`] before iterating.
//!
//! Requests are written through [`XmlBuilder`], which escapes every text
//! node and attribute value.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::TriasError;

const MIXED_TEXT_KEY: &str = "#text";

/// A parsed XML node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    /// Element without child elements (possibly empty text)
    Text(String),
    /// Element with child elements, in document order
    Element(Vec<(String, XmlValue)>),
    /// Several sibling elements sharing one name
    List(Vec<XmlValue>),
}

impl XmlValue {
    /// Child element by name
    ///
    /// Looking up a key on a list reads from its first entry, so singular
    /// fields that the service happens to repeat (e.g. one `Text` per
    /// language) still resolve.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Element(children) => children.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::List(items) => items.first().and_then(|item| item.get(key)),
            Self::Text(_) => None,
        }
    }

    /// Walk a path of child names
    #[must_use]
    pub fn path(&self, path: &[&str]) -> Option<&Self> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Text content of this node
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::List(items) => items.first().and_then(Self::text),
            Self::Element(_) => self.get(MIXED_TEXT_KEY).and_then(Self::text),
        }
    }

    /// Text content at `path`, if present and non-empty
    #[must_use]
    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.path(path)
            .and_then(Self::text)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Node at `path`, failing with a parse error naming the path
    pub fn require(&self, path: &[&str]) -> Result<&Self, TriasError> {
        self.path(path).ok_or_else(|| TriasError::missing(&path.join("/")))
    }

    /// Non-empty text at `path`, failing with a parse error naming the path
    pub fn require_text(&self, path: &[&str]) -> Result<&str, TriasError> {
        self.text_at(path).ok_or_else(|| TriasError::missing(&path.join("/")))
    }

    /// View this node as a list: a list yields its entries, anything else
    /// yields itself as the only entry
    #[must_use]
    pub fn as_list(&self) -> &[Self] {
        match self {
            Self::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Move the node at `path` out of this tree
    #[must_use]
    pub fn into_path(self, path: &[&str]) -> Option<Self> {
        path.iter().try_fold(self, |node, key| node.into_child(key))
    }

    fn into_child(self, key: &str) -> Option<Self> {
        match self {
            Self::Element(children) => children.into_iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::List(items) => items.into_iter().next().and_then(|item| item.into_child(key)),
            Self::Text(_) => None,
        }
    }
}

struct Frame {
    name: String,
    children: Vec<(String, XmlValue)>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn insert(&mut self, key: String, value: XmlValue) {
        match self.children.iter_mut().find(|(k, _)| *k == key) {
            Some((_, XmlValue::List(items))) => items.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, XmlValue::List(Vec::new()));
                *existing = XmlValue::List(vec![first, value]);
            },
            None => self.children.push((key, value)),
        }
    }

    fn into_value(mut self) -> XmlValue {
        if self.children.is_empty() {
            return XmlValue::Text(self.text);
        }
        if !self.text.trim().is_empty() {
            self.children.push((MIXED_TEXT_KEY.to_string(), XmlValue::Text(self.text)));
        }
        XmlValue::Element(self.children)
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse a document into a tree whose root element holds the document
/// element (e.g. `root.get("Trias")`)
///
/// # Errors
///
/// Returns [`TriasError::ParseError`] for malformed or empty documents.
pub fn parse(body: &str) -> Result<XmlValue, TriasError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Frame::new(String::new())];

    loop {
        let event = reader.read_event().map_err(|e| {
            TriasError::ParseError(format!(
                "malformed XML at position {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => stack.push(Frame::new(local_name(e.local_name().as_ref()))),
            Event::Empty(e) => {
                if let Some(top) = stack.last_mut() {
                    top.insert(local_name(e.local_name().as_ref()), XmlValue::Text(String::new()));
                }
            },
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| TriasError::ParseError(format!("invalid text node: {err}")))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            },
            Event::CData(e) => {
                let raw = e.into_inner();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&raw));
                }
            },
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(TriasError::ParseError("unbalanced closing tag".to_string()));
                }
                if let Some(frame) = stack.pop() {
                    let name = frame.name.clone();
                    if let Some(parent) = stack.last_mut() {
                        parent.insert(name, frame.into_value());
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    let root = stack
        .pop()
        .filter(|_| stack.is_empty())
        .ok_or_else(|| TriasError::ParseError("unexpected end of document".to_string()))?;
    if root.children.is_empty() {
        return Err(TriasError::ParseError(
            "document has no root element".to_string(),
        ));
    }
    Ok(XmlValue::Element(root.children))
}

/// Streaming XML writer for request bodies
pub struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl std::fmt::Debug for XmlBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlBuilder")
            .field("bytes", &self.writer.get_ref().len())
            .finish()
    }
}

impl Default for XmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlBuilder {
    /// Create an indenting builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    /// Write the `<?xml ...?>` declaration
    pub fn declaration(&mut self) -> Result<&mut Self, TriasError> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    /// Open an element
    pub fn open(&mut self, name: &str) -> Result<&mut Self, TriasError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    /// Open an element carrying attributes
    pub fn open_with(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<&mut Self, TriasError> {
        let mut start = BytesStart::new(name);
        for &(key, value) in attributes {
            start.push_attribute((key, value));
        }
        self.event(Event::Start(start))
    }

    /// Close an element
    pub fn close(&mut self, name: &str) -> Result<&mut Self, TriasError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// Write `<name>text</name>`
    pub fn leaf(&mut self, name: &str, text: &str) -> Result<&mut Self, TriasError> {
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Write `<name>true|false</name>`
    pub fn flag(&mut self, name: &str, value: bool) -> Result<&mut Self, TriasError> {
        self.leaf(name, bool_str(value))
    }

    fn event(&mut self, event: Event<'_>) -> Result<&mut Self, TriasError> {
        self.writer
            .write_event(event)
            .map_err(|e| TriasError::InvalidInput(format!("cannot encode request: {e}")))?;
        Ok(self)
    }

    /// Finish and return the document text
    pub fn finish(self) -> Result<String, TriasError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| TriasError::InvalidInput(format!("request is not UTF-8: {e}")))
    }
}

/// Convert bool to the "true"/"false" spelling the schema expects
const fn bool_str(val: bool) -> &'static str {
    if val { "true" } else { "false" }
}
