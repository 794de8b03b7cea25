//! Rendered output tree: leaf, composite and indexed element nodes.

use std::fmt;

use crate::xml::{CeilingExceeded, DocumentWriter, XmlElement, XmlError};

/// Element name for a named property node.
pub const PROPERTY_TAG: &str = "Property";

/// Element name for an indexed sequence element.
pub const ELEMENT_TAG: &str = "Element";

/// Marks an expanded composite that has no children, which would otherwise
/// read back as an empty leaf.
pub const EMPTY_ATTR: &str = "empty";

/// Why a node was rendered without its value or children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truncation {
    /// The depth bound was reached.
    Depth,
    /// The caller's node-count bound was reached.
    Count,
    /// The caller's soft size bound was exceeded.
    Size,
    /// The object is already being expanded on the current path.
    Cycle,
    /// Reading the property failed.
    Unreadable,
}

impl Truncation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Count => "count",
            Self::Size => "size",
            Self::Cycle => "cycle",
            Self::Unreadable => "unreadable",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "depth" => Some(Self::Depth),
            "count" => Some(Self::Count),
            "size" => Some(Self::Size),
            "cycle" => Some(Self::Cycle),
            "unreadable" => Some(Self::Unreadable),
            _ => None,
        }
    }
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    /// Rendered leaf text.
    Value(String),
    /// Leaf whose value is absent.
    Null,
    /// Expanded composite.
    Children(Vec<Node>),
    /// Opaque node: declared type only.
    Truncated(Truncation),
}

/// One unit of rendered output.
///
/// A node with `index` set is an element of a sequence; otherwise it is a
/// named property.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub type_name: String,
    pub index: Option<usize>,
    pub body: NodeBody,
}

impl Node {
    pub fn leaf(name: impl Into<String>, type_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_body(name, type_name, NodeBody::Value(text.into()))
    }

    pub fn null(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_body(name, type_name, NodeBody::Null)
    }

    pub fn composite(name: impl Into<String>, type_name: impl Into<String>, children: Vec<Node>) -> Self {
        Self::with_body(name, type_name, NodeBody::Children(children))
    }

    pub fn truncated(name: impl Into<String>, type_name: impl Into<String>, reason: Truncation) -> Self {
        Self::with_body(name, type_name, NodeBody::Truncated(reason))
    }

    fn with_body(name: impl Into<String>, type_name: impl Into<String>, body: NodeBody) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            index: None,
            body,
        }
    }

    /// Marks this node as element `index` of a sequence.
    #[must_use]
    pub fn at_index(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }

    /// Children of an expanded composite; empty for everything else.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match &self.body {
            NodeBody::Children(c) => c,
            _ => &[],
        }
    }

    /// Named child property.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.index.is_none() && c.name == name)
    }

    /// Sequence element by index.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&Node> {
        self.children().iter().find(|c| c.index == Some(index))
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Value(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn truncation(&self) -> Option<Truncation> {
        match self.body {
            NodeBody::Truncated(reason) => Some(reason),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        matches!(self.body, NodeBody::Children(_))
    }

    /// Number of nodes in this subtree, including itself.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(Node::count).sum::<usize>()
    }

    /// Longest chain of expanded composites below this node.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.children()
            .iter()
            .filter(|c| c.is_expanded())
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// All leaf nodes with a rendered value, depth-first.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Node>) {
        match &self.body {
            NodeBody::Value(_) => out.push(self),
            NodeBody::Children(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            NodeBody::Null | NodeBody::Truncated(_) => {}
        }
    }

    /// Rough rendered size of this node's own header and text, in bytes.
    #[must_use]
    pub fn size_estimate(&self) -> usize {
        const TAG_OVERHEAD: usize = 40;
        let text = self.text().map_or(0, str::len);
        TAG_OVERHEAD + self.name.len() + self.type_name.len() + text
    }

    // -----------------------------------------------------------------------
    // XML
    // -----------------------------------------------------------------------

    /// Writes this node and its subtree.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the writer's ceiling is crossed.
    pub fn write_xml(&self, w: &mut DocumentWriter) -> Result<(), CeilingExceeded> {
        let index_text = self.index.map(|i| i.to_string());
        let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(3);
        let tag = if let Some(index) = index_text.as_deref() {
            attrs.push(("index", index));
            ELEMENT_TAG
        } else {
            attrs.push(("name", self.name.as_str()));
            PROPERTY_TAG
        };
        attrs.push(("type", self.type_name.as_str()));

        match &self.body {
            NodeBody::Value(text) => w.text_element(tag, &attrs, text),
            NodeBody::Null => {
                attrs.push(("null", "true"));
                w.empty(tag, &attrs)
            }
            NodeBody::Truncated(reason) => {
                attrs.push(("truncated", reason.as_str()));
                w.empty(tag, &attrs)
            }
            NodeBody::Children(children) if children.is_empty() => {
                attrs.push((EMPTY_ATTR, "true"));
                w.empty(tag, &attrs)
            }
            NodeBody::Children(children) => {
                w.start(tag, &attrs)?;
                for child in children {
                    child.write_xml(w)?;
                }
                w.end(tag)
            }
        }
    }

    /// Rebuilds a node from a parsed `Property` or `Element` element.
    ///
    /// An element without child nodes is read back as a leaf unless it
    /// carries `empty="true"`.
    ///
    /// # Errors
    ///
    /// Returns `XmlError::InvalidElement` for unknown tags, a missing `type`
    /// or `name`, a bad `index` or an unknown truncation reason.
    pub fn from_xml(el: &XmlElement) -> Result<Self, XmlError> {
        let invalid = |reason: &str| XmlError::InvalidElement {
            element: el.name.clone(),
            reason: reason.to_string(),
        };

        let (name, index) = match el.name.as_str() {
            PROPERTY_TAG => (el.attr("name").ok_or_else(|| invalid("missing name"))?, None),
            ELEMENT_TAG => {
                let index = el
                    .attr("index")
                    .and_then(|i| i.parse::<usize>().ok())
                    .ok_or_else(|| invalid("missing or invalid index"))?;
                ("", Some(index))
            }
            _ => return Err(invalid("unexpected element")),
        };
        let type_name = el.attr("type").ok_or_else(|| invalid("missing type"))?;

        let body = if let Some(reason) = el.attr("truncated") {
            NodeBody::Truncated(Truncation::parse(reason).ok_or_else(|| invalid("unknown truncation"))?)
        } else if el.attr("null") == Some("true") {
            NodeBody::Null
        } else if el.attr(EMPTY_ATTR) == Some("true") {
            NodeBody::Children(Vec::new())
        } else if el.children.is_empty() {
            NodeBody::Value(el.text.clone())
        } else {
            NodeBody::Children(el.children.iter().map(Node::from_xml).collect::<Result<_, _>>()?)
        };

        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            index,
            body,
        })
    }
}
