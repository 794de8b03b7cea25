//! `mxgate` Core: resource names, typed values, bounded graph walking and
//! the XML document model shared by the gateway.

pub mod coerce;
pub mod name;
pub mod node;
pub mod operation;
pub mod traits;
pub mod types;
pub mod walker;
pub mod xml;

pub use coerce::{coerce, render, types_equivalent, CoerceError, TypeFamily};
pub use name::{Glob, NameError, NamePattern, ResourceName};
pub use node::{Node, NodeBody, Truncation};
pub use operation::{DuplicateSignature, OperationSet, OperationSignature, ParameterInfo, VOID_TYPE};
pub use traits::{Introspectable, ManagedResource};
pub use types::{ObjectId, ObjectRef, Sequence, Value};
pub use walker::{
    Exclusion, GraphWalker, NoFilter, PropertyFilter, WalkLimits, DEFAULT_MAX_DEPTH, MAX_NESTING,
};
pub use xml::{parse_element, CeilingExceeded, DocumentWriter, XmlElement, XmlError, PROTOCOL_VERSION};
