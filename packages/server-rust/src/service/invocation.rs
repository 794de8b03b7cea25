use std::fmt;
use std::time::Duration;

use mxgate_core::{OperationSignature, Value};

use crate::traits::ResourceRef;

/// Context carried with every invocation through the pipeline.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub call_id: u64,
    /// Canonical name of the target resource.
    pub resource: String,
    pub operation: String,
    /// Wall-clock deadline for the whole call.
    pub timeout: Duration,
}

impl InvocationContext {
    #[must_use]
    pub fn new(
        call_id: u64,
        resource: impl Into<String>,
        operation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            call_id,
            resource: resource.into(),
            operation: operation.into(),
            timeout,
        }
    }

    /// Deadline in whole milliseconds, saturating.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A resolved call with coerced arguments, ready to execute.
pub struct Invocation {
    pub ctx: InvocationContext,
    pub target: ResourceRef,
    pub signature: OperationSignature,
    pub args: Vec<Value>,
}

impl Invocation {
    #[must_use]
    pub fn ctx(&self) -> &InvocationContext {
        &self.ctx
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("ctx", &self.ctx)
            .field("signature", &self.signature)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
