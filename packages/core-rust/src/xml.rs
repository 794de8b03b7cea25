//! Minimal XML writer with a hard size ceiling, and a tree reader.
//!
//! Documents are written incrementally into a `String`; every write is
//! checked against the absolute ceiling so an oversized document fails as
//! soon as it crosses the limit rather than after it has been built. A
//! write that would cross the ceiling leaves the buffer untouched.
//! Reading uses `quick-xml` and produces an owned [`XmlElement`] tree.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

/// Protocol version attribute carried on every document root.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Name of the protocol version attribute.
pub const VERSION_ATTR: &str = "version";

/// Deepest element nesting [`parse_element`] accepts.
pub const MAX_ELEMENT_DEPTH: usize = 256;

/// The absolute document-size ceiling was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("document size {reached} exceeds the absolute ceiling of {limit} bytes")]
pub struct CeilingExceeded {
    pub limit: usize,
    pub reached: usize,
}

/// Errors raised while reading an XML document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Syntax(String),
    #[error("document has no root element")]
    NoRootElement,
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error("unexpected end of document inside <{0}>")]
    Unclosed(String),
    #[error("invalid <{element}> element: {reason}")]
    InvalidElement { element: String, reason: String },
    #[error("elements nested deeper than {0} levels")]
    TooDeep(usize),
}

// ---------------------------------------------------------------------------
// DocumentWriter
// ---------------------------------------------------------------------------

fn escape_text(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

fn escape_attr(s: &str) -> Cow<'_, str> {
    let escaped = quick_xml::escape::escape(s);
    if escaped.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            escaped
                .replace('\n', "&#10;")
                .replace('\r', "&#13;")
                .replace('\t', "&#9;"),
        )
    } else {
        escaped
    }
}

/// Incremental XML writer bounded by an absolute ceiling in bytes.
#[derive(Debug)]
pub struct DocumentWriter {
    buf: String,
    ceiling: usize,
}

impl DocumentWriter {
    #[must_use]
    pub fn new(ceiling: usize) -> Self {
        Self {
            buf: String::new(),
            ceiling,
        }
    }

    /// Opens `<tag attr="..">`.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the write crosses the ceiling.
    pub fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), CeilingExceeded> {
        let mut open = Self::open_tag(tag, attrs);
        open.push('>');
        self.push(&open)
    }

    /// Writes a self-closing `<tag attr=".."/>`.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the write crosses the ceiling.
    pub fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), CeilingExceeded> {
        let mut open = Self::open_tag(tag, attrs);
        open.push_str("/>");
        self.push(&open)
    }

    /// Closes `</tag>`.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the write crosses the ceiling.
    pub fn end(&mut self, tag: &str) -> Result<(), CeilingExceeded> {
        self.push(&format!("</{tag}>"))
    }

    /// Writes `<tag ..>text</tag>` with the text escaped.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the write crosses the ceiling.
    pub fn text_element(
        &mut self,
        tag: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), CeilingExceeded> {
        let mut fragment = Self::open_tag(tag, attrs);
        fragment.push('>');
        fragment.push_str(&escape_text(text));
        fragment.push_str("</");
        fragment.push_str(tag);
        fragment.push('>');
        self.push(&fragment)
    }

    /// Appends an already-rendered fragment.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the write crosses the ceiling.
    pub fn raw(&mut self, fragment: &str) -> Result<(), CeilingExceeded> {
        self.push(fragment)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }

    fn open_tag(tag: &str, attrs: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(tag.len() + 1 + attrs.len() * 16);
        out.push('<');
        out.push_str(tag);
        for (key, value) in attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out
    }

    fn push(&mut self, s: &str) -> Result<(), CeilingExceeded> {
        let reached = self.buf.len() + s.len();
        if reached > self.ceiling {
            return Err(CeilingExceeded {
                limit: self.ceiling,
                reached,
            });
        }
        self.buf.push_str(s);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// XmlElement
// ---------------------------------------------------------------------------

/// Owned element tree produced by [`parse_element`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data directly inside this element, untrimmed.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| XmlError::Syntax(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| XmlError::Syntax(err.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }
}

/// Parses a document and returns its single root element.
///
/// # Errors
///
/// Returns `XmlError` for syntax errors, missing or multiple roots,
/// unclosed elements and nesting beyond [`MAX_ELEMENT_DEPTH`].
pub fn parse_element(src: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(src);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| XmlError::Syntax(err.to_string()))?;
        match event {
            Event::Start(ref e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlError::MultipleRoots);
                }
                if stack.len() >= MAX_ELEMENT_DEPTH {
                    return Err(XmlError::TooDeep(MAX_ELEMENT_DEPTH));
                }
                stack.push(XmlElement::from_start(e)?);
            }
            Event::Empty(ref e) => {
                let element = XmlElement::from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element)?;
                }
            }
            Event::Text(ref t) => {
                if let Some(parent) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|err| XmlError::Syntax(err.to_string()))?;
                    parent.text.push_str(&text);
                }
            }
            Event::CData(ref c) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(c.as_ref()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Unclosed(open.name.clone()));
    }
    root.ok_or(XmlError::NoRootElement)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_some() {
        Err(XmlError::MultipleRoots)
    } else {
        *root = Some(element);
        Ok(())
    }
}
