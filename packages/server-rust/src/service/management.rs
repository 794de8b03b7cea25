//! The gateway's own management resource, `mxgate:type=Gateway`.

use std::sync::Arc;
use std::time::Instant;

use mxgate_core::{
    Introspectable, ManagedResource, ObjectRef, OperationSet, OperationSignature, Value,
    PROTOCOL_VERSION, VOID_TYPE,
};

use super::config::GatewayConfig;
use super::filter::AttributeFilter;

pub const GATEWAY_REGISTRY: &str = "gateway";
pub const GATEWAY_RESOURCE: &str = "mxgate:type=Gateway";

/// Self-management resource exposing version, uptime, the active filter
/// rule count and the configured limits.
pub struct GatewayResource {
    started: Instant,
    filter: Arc<AttributeFilter>,
    limits: ObjectRef,
    operations: OperationSet,
}

impl GatewayResource {
    /// # Errors
    ///
    /// Fails only if the operation table contains a duplicate signature.
    pub fn new(config: &GatewayConfig, filter: Arc<AttributeFilter>) -> anyhow::Result<Self> {
        let mut operations = OperationSet::new();
        operations.add(OperationSignature::new("reloadFilters", "int"))?;
        operations.add(OperationSignature::new("ping", VOID_TYPE))?;
        operations.add(OperationSignature::new("echo", "string").param("message", "string"))?;
        Ok(Self {
            started: Instant::now(),
            filter,
            limits: Arc::new(LimitsView::from(config)),
            operations,
        })
    }
}

impl Introspectable for GatewayResource {
    fn type_name(&self) -> &str {
        "Gateway"
    }

    fn property_names(&self) -> Vec<String> {
        ["version", "protocolVersion", "uptimeSecs", "filterRules", "limits"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn property_value(&self, name: &str) -> anyhow::Result<Value> {
        Ok(match name {
            "version" => Value::from(env!("CARGO_PKG_VERSION")),
            "protocolVersion" => Value::from(PROTOCOL_VERSION),
            "uptimeSecs" => Value::Long(saturating_i64(self.started.elapsed().as_secs())),
            "filterRules" => Value::Long(saturating_i64(self.filter.rule_count() as u64)),
            "limits" => Value::Object(Arc::clone(&self.limits)),
            other => anyhow::bail!("no property {other}"),
        })
    }
}

impl ManagedResource for GatewayResource {
    fn operations(&self) -> &OperationSet {
        &self.operations
    }

    fn invoke(&self, signature: &OperationSignature, args: Vec<Value>) -> anyhow::Result<Value> {
        match (signature.name.as_str(), args.as_slice()) {
            ("reloadFilters", []) => {
                let count = self.filter.reload()?;
                Ok(Value::Int(i32::try_from(count).unwrap_or(i32::MAX)))
            }
            ("ping", []) => Ok(Value::Null),
            ("echo", [Value::Text(message)]) => Ok(Value::Text(message.clone())),
            (other, _) => anyhow::bail!("unsupported operation {other}"),
        }
    }
}

/// Read-only view of [`GatewayConfig`] limits.
struct LimitsView {
    default_max_depth: usize,
    document_ceiling: usize,
    max_request_length: usize,
    default_invoke_timeout_ms: u64,
    default_response_max: usize,
    max_concurrent_invocations: u32,
}

impl From<&GatewayConfig> for LimitsView {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            default_max_depth: config.default_max_depth,
            document_ceiling: config.document_ceiling,
            max_request_length: config.max_request_length,
            default_invoke_timeout_ms: u64::try_from(config.default_invoke_timeout.as_millis())
                .unwrap_or(u64::MAX),
            default_response_max: config.default_response_max,
            max_concurrent_invocations: config.max_concurrent_invocations,
        }
    }
}

impl Introspectable for LimitsView {
    fn type_name(&self) -> &str {
        "Limits"
    }

    fn property_names(&self) -> Vec<String> {
        [
            "defaultMaxDepth",
            "documentCeiling",
            "maxRequestLength",
            "defaultInvokeTimeoutMs",
            "defaultResponseMax",
            "maxConcurrentInvocations",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn property_value(&self, name: &str) -> anyhow::Result<Value> {
        let v = match name {
            "defaultMaxDepth" => self.default_max_depth as u64,
            "documentCeiling" => self.document_ceiling as u64,
            "maxRequestLength" => self.max_request_length as u64,
            "defaultInvokeTimeoutMs" => self.default_invoke_timeout_ms,
            "defaultResponseMax" => self.default_response_max as u64,
            "maxConcurrentInvocations" => u64::from(self.max_concurrent_invocations),
            other => anyhow::bail!("no property {other}"),
        };
        Ok(Value::Long(saturating_i64(v)))
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
