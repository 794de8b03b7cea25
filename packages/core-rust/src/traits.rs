use crate::name::ResourceName;
use crate::operation::{OperationSet, OperationSignature};
use crate::types::Value;

/// Capability to enumerate and read named properties at runtime.
///
/// The graph walker depends only on this trait, never on concrete types.
/// Implementations should be cheap to call repeatedly: the walker reads each
/// property at most once per visit but may visit shared objects on several
/// paths.
pub trait Introspectable: Send + Sync {
    /// Stable declared type name of this object.
    fn type_name(&self) -> &str;

    /// Property names in rendering order.
    fn property_names(&self) -> Vec<String>;

    /// Current value of one property. Errors are rendered as unreadable nodes.
    fn property_value(&self, name: &str) -> anyhow::Result<Value>;

    /// Registry identity of this object when it is itself a managed resource.
    ///
    /// Used to apply the object's own attribute filter rules when it appears
    /// nested inside another resource's graph.
    fn resource_name(&self) -> Option<ResourceName> {
        None
    }
}

/// A resource exposed through a registry: introspectable plus invocable.
///
/// `invoke` may block; the dispatcher always runs it off the async runtime
/// and stops waiting once the caller's deadline passes.
pub trait ManagedResource: Introspectable {
    /// Exposed operations, grouped by name.
    fn operations(&self) -> &OperationSet;

    /// Executes one resolved operation with already-coerced arguments.
    ///
    /// Void operations return `Value::Null`.
    fn invoke(&self, signature: &OperationSignature, args: Vec<Value>) -> anyhow::Result<Value>;
}
