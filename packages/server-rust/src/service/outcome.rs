//! Invocation outcome documents.
//!
//! ```text
//! <InvocationResult version="1.0">
//!   <Status>success</Status>
//!   <Result type="int">5</Result>
//! </InvocationResult>
//!
//! <InvocationResult version="1.0">
//!   <Status>error</Status>
//!   <Error kind="InvocationTimeout">invocation did not complete within 50ms</Error>
//! </InvocationResult>
//! ```
//!
//! Void operations produce the success status alone.

use mxgate_core::node::EMPTY_ATTR;
use mxgate_core::{CeilingExceeded, DocumentWriter, Node, NodeBody, PROTOCOL_VERSION};

use crate::error::GatewayError;

pub const OUTCOME_TAG: &str = "InvocationResult";
pub const STATUS_TAG: &str = "Status";
pub const RESULT_TAG: &str = "Result";
pub const ERROR_TAG: &str = "Error";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Result of one invocation attempt past request decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// `result` is `None` for void operations.
    Success { result: Option<Node> },
    Error { kind: &'static str, message: String },
}

impl InvocationOutcome {
    #[must_use]
    pub fn error(err: &GatewayError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error kind, if this is an error outcome.
    #[must_use]
    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            Self::Error { kind, .. } => Some(kind),
            Self::Success { .. } => None,
        }
    }

    /// Renders the outcome document.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the document crosses `ceiling`.
    pub fn to_document(&self, ceiling: usize) -> Result<String, CeilingExceeded> {
        let mut w = DocumentWriter::new(ceiling);
        w.start(OUTCOME_TAG, &[("version", PROTOCOL_VERSION)])?;
        match self {
            Self::Success { result } => {
                w.text_element(STATUS_TAG, &[], STATUS_SUCCESS)?;
                if let Some(node) = result {
                    write_result(&mut w, node)?;
                }
            }
            Self::Error { kind, message } => {
                w.text_element(STATUS_TAG, &[], STATUS_ERROR)?;
                w.text_element(ERROR_TAG, &[("kind", kind)], message)?;
            }
        }
        w.end(OUTCOME_TAG)?;
        Ok(w.finish())
    }
}

/// Writes a rendered result as a `Result` element. Composite results carry
/// their properties as child nodes.
///
/// # Errors
///
/// Returns `CeilingExceeded` if the writer's ceiling is crossed.
pub fn write_result(w: &mut DocumentWriter, node: &Node) -> Result<(), CeilingExceeded> {
    let type_attr = ("type", node.type_name.as_str());
    match &node.body {
        NodeBody::Value(text) => w.text_element(RESULT_TAG, &[type_attr], text),
        NodeBody::Null => w.empty(RESULT_TAG, &[type_attr, ("null", "true")]),
        NodeBody::Truncated(reason) => w.empty(RESULT_TAG, &[type_attr, ("truncated", reason.as_str())]),
        NodeBody::Children(children) if children.is_empty() => {
            w.empty(RESULT_TAG, &[type_attr, (EMPTY_ATTR, "true")])
        }
        NodeBody::Children(children) => {
            w.start(RESULT_TAG, &[type_attr])?;
            for child in children {
                child.write_xml(w)?;
            }
            w.end(RESULT_TAG)
        }
    }
}

#[cfg(test)]
mod tests {
    use mxgate_core::parse_element;

    use super::*;

    #[test]
    fn void_success_has_status_only() {
        let doc = InvocationOutcome::Success { result: None }
            .to_document(4096)
            .unwrap();
        assert_eq!(
            doc,
            r#"<InvocationResult version="1.0"><Status>success</Status></InvocationResult>"#
        );
    }

    #[test]
    fn leaf_result() {
        let doc = InvocationOutcome::Success {
            result: Some(Node::leaf("result", "int", "5")),
        }
        .to_document(4096)
        .unwrap();
        let root = parse_element(&doc).unwrap();
        let result = root.child(RESULT_TAG).unwrap();
        assert_eq!(result.attr("type"), Some("int"));
        assert_eq!(result.text, "5");
    }

    #[test]
    fn composite_result_nests_properties() {
        let node = Node::composite("result", "Summary", vec![Node::leaf("count", "int", "2")]);
        let doc = InvocationOutcome::Success { result: Some(node) }
            .to_document(4096)
            .unwrap();
        let root = parse_element(&doc).unwrap();
        let result = root.child(RESULT_TAG).unwrap();
        let count = Node::from_xml(&result.children[0]).unwrap();
        assert_eq!(count.text(), Some("2"));
    }

    #[test]
    fn empty_composite_result_is_marked() {
        let node = Node::composite("result", "Summary", Vec::new());
        let doc = InvocationOutcome::Success { result: Some(node) }
            .to_document(4096)
            .unwrap();
        let result = parse_element(&doc).unwrap().child(RESULT_TAG).cloned().unwrap();
        assert_eq!(result.attr(EMPTY_ATTR), Some("true"));
        assert!(result.children.is_empty());
    }

    #[test]
    fn error_outcome_carries_kind() {
        let outcome = InvocationOutcome::error(&GatewayError::OperationNotFound {
            resource: "app:type=A".into(),
            operation: "nope".into(),
        });
        assert_eq!(outcome.error_kind(), Some("OperationNotFound"));
        let root = parse_element(&outcome.to_document(4096).unwrap()).unwrap();
        assert_eq!(root.attr("version"), Some(PROTOCOL_VERSION));
        assert_eq!(root.child(STATUS_TAG).unwrap().text, STATUS_ERROR);
        assert_eq!(
            root.child(ERROR_TAG).unwrap().attr("kind"),
            Some("OperationNotFound")
        );
    }
}
