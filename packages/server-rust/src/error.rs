//! Error taxonomy shared by the serializer, the invocation path and the
//! HTTP surface.

use axum::http::StatusCode;
use mxgate_core::{CeilingExceeded, CoerceError, NameError};

/// Every failure the gateway can report.
///
/// Request faults (see [`GatewayError::is_request_fault`]) are rejected
/// before any document is produced. Everything else is rendered as an error
/// outcome carrying [`GatewayError::kind`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("malformed invocation request: {0}")]
    RequestMalformed(String),
    #[error("empty invocation request: {0}")]
    RequestEmpty(String),
    #[error("invocation request of {declared} characters exceeds the maximum of {max}")]
    RequestTooLarge { declared: i64, max: usize },
    #[error("invocation request declared {declared} characters but only {available} were available")]
    RequestTruncated { declared: usize, available: usize },
    #[error("invalid value {value:?} for {parameter}: expected a non-negative integer")]
    InvalidOverride { parameter: &'static str, value: String },

    #[error("no resource matches {0}")]
    ResourceNotFound(String),
    #[error("{count} resources match {pattern}")]
    ResourceAmbiguous { pattern: String, count: usize },

    #[error("operation {operation} not found on {resource}")]
    OperationNotFound { resource: String, operation: String },
    #[error("operation {operation} on {resource} is ambiguous for the supplied parameter types")]
    OperationAmbiguous { resource: String, operation: String },
    #[error("operation {operation} takes {expected:?} parameters, {supplied} supplied")]
    ParameterCountMismatch {
        operation: String,
        expected: Vec<usize>,
        supplied: usize,
    },
    #[error("parameter {index}: unknown type {type_name:?}")]
    ParameterTypeInvalid { index: usize, type_name: String },
    #[error("parameter {index}: {source}")]
    ParameterValueInvalid {
        index: usize,
        #[source]
        source: CoerceError,
    },

    #[error("invocation did not complete within {timeout_ms}ms")]
    InvocationTimeout { timeout_ms: u64 },
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("rendered result of {size} bytes exceeds the limit of {limit}")]
    ResponseTooLarge { size: usize, limit: usize },
    #[error("rendering {identity} for query {query} exceeded the document ceiling: {source}")]
    DocumentSizeExceeded {
        query: String,
        identity: String,
        #[source]
        source: CeilingExceeded,
    },

    #[error("gateway overloaded, try again later")]
    Overloaded,
    #[error("invalid resource name: {0}")]
    InvalidName(#[from] NameError),
    #[error("filter configuration: {0}")]
    FilterConfig(String),
    #[error("registry failure: {0}")]
    Registry(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable machine-readable name of this error.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestMalformed(_) => "RequestMalformed",
            Self::RequestEmpty(_) => "RequestEmpty",
            Self::RequestTooLarge { .. } => "RequestTooLarge",
            Self::RequestTruncated { .. } => "RequestTruncated",
            Self::InvalidOverride { .. } => "InvalidOverride",
            Self::ResourceNotFound(_) => "ResourceNotFound",
            Self::ResourceAmbiguous { .. } => "ResourceAmbiguous",
            Self::OperationNotFound { .. } => "OperationNotFound",
            Self::OperationAmbiguous { .. } => "OperationAmbiguous",
            Self::ParameterCountMismatch { .. } => "ParameterCountMismatch",
            Self::ParameterTypeInvalid { .. } => "ParameterTypeInvalid",
            Self::ParameterValueInvalid { .. } => "ParameterValueInvalid",
            Self::InvocationTimeout { .. } => "InvocationTimeout",
            Self::InvocationFailed(_) => "InvocationFailed",
            Self::ResponseTooLarge { .. } => "ResponseTooLarge",
            Self::DocumentSizeExceeded { .. } => "DocumentSizeExceeded",
            Self::Overloaded => "Overloaded",
            Self::InvalidName(_) => "InvalidName",
            Self::FilterConfig(_) => "FilterConfig",
            Self::Registry(_) => "Registry",
        }
    }

    /// True for faults in the request itself, which are rejected before
    /// any outcome document is produced.
    #[must_use]
    pub fn is_request_fault(&self) -> bool {
        matches!(
            self,
            Self::RequestMalformed(_)
                | Self::RequestEmpty(_)
                | Self::RequestTooLarge { .. }
                | Self::RequestTruncated { .. }
                | Self::InvalidOverride { .. }
        )
    }

    /// HTTP status for errors surfaced outside an outcome document.
    ///
    /// Invocation-time and resolution errors travel inside a 200 outcome
    /// document; the statuses listed for them apply only when one reaches
    /// the transport directly.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestMalformed(_)
            | Self::RequestEmpty(_)
            | Self::RequestTruncated { .. }
            | Self::InvalidOverride { .. }
            | Self::InvalidName(_)
            | Self::ParameterCountMismatch { .. }
            | Self::ParameterTypeInvalid { .. }
            | Self::ParameterValueInvalid { .. } => StatusCode::BAD_REQUEST,
            Self::RequestTooLarge { .. }
            | Self::DocumentSizeExceeded { .. }
            | Self::ResponseTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ResourceNotFound(_) | Self::OperationNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceAmbiguous { .. } | Self::OperationAmbiguous { .. } => StatusCode::CONFLICT,
            Self::InvocationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvocationFailed(_) | Self::FilterConfig(_) | Self::Registry(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
