use std::path::PathBuf;
use std::time::Duration;

use mxgate_core::DEFAULT_MAX_DEPTH;

/// Gateway-level limits and collaborator configuration.
///
/// Controls traversal defaults, the absolute document ceiling, invocation
/// limits and where attribute filter rules are loaded from.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Traversal depth used when a caller does not supply `maxDepth`.
    pub default_max_depth: usize,
    /// Absolute document-size ceiling in bytes. Always enforced.
    pub document_ceiling: usize,
    /// Absolute maximum declared length of an invocation request.
    pub max_request_length: usize,
    /// Invocation deadline used when a caller does not supply `maxTime`.
    pub default_invoke_timeout: Duration,
    /// Rendered-result cap used when a caller does not supply `maxSize`.
    pub default_response_max: usize,
    /// Concurrent invocations before new ones are rejected.
    pub max_concurrent_invocations: u32,
    /// JSON file holding attribute filter rules.
    pub filter_rules_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_max_depth: DEFAULT_MAX_DEPTH,
            document_ceiling: 8 * 1024 * 1024,
            max_request_length: 1024 * 1024,
            default_invoke_timeout: Duration::from_secs(30),
            default_response_max: 1024 * 1024,
            max_concurrent_invocations: 64,
            filter_rules_path: None,
        }
    }
}
