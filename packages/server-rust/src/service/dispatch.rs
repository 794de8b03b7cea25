//! Invocation dispatch: coerce wire parameters, run the resolved operation
//! through the invocation pipeline, render the outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mxgate_core::{
    coerce, CoerceError, DocumentWriter, Glob, GraphWalker, Node, OperationSignature, Value,
    WalkLimits,
};
use parking_lot::Mutex;
use tower::ServiceExt;
use tracing::{debug, warn};

use super::config::GatewayConfig;
use super::decode::{InvocationRequest, ParameterSpec};
use super::executor::InvocationExecutor;
use super::filter::AttributeFilter;
use super::invocation::{Invocation, InvocationContext};
use super::middleware::{build_invocation_pipeline, InvocationPipeline};
use super::outcome::{write_result, InvocationOutcome};
use super::registry::RegistrySet;
use super::resolve::OperationResolver;
use super::serializer::parse_non_negative;
use crate::error::GatewayError;
use crate::traits::NamedResource;

/// Node name given to rendered results.
pub const RESULT_NAME: &str = "result";

// ---------------------------------------------------------------------------
// InvokeLimits
// ---------------------------------------------------------------------------

/// Caller-supplied invocation bounds; `None` means "use the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeLimits {
    pub max_time: Option<Duration>,
    pub max_size: Option<usize>,
}

impl InvokeLimits {
    /// Validates raw `maxTime` (milliseconds) and `maxSize` (bytes) values.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidOverride` for any value that is not a
    /// non-negative integer.
    pub fn parse(max_time: Option<&str>, max_size: Option<&str>) -> Result<Self, GatewayError> {
        let max_time = parse_non_negative("maxTime", max_time)?
            .map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX)));
        Ok(Self {
            max_time,
            max_size: parse_non_negative("maxSize", max_size)?,
        })
    }
}

// ---------------------------------------------------------------------------
// InvocationDispatcher
// ---------------------------------------------------------------------------

/// Executes resolved operations under a deadline and a response-size cap.
///
/// Every failure past request decoding becomes an error outcome; nothing
/// here returns a transport-level fault.
pub struct InvocationDispatcher {
    pipeline: Mutex<InvocationPipeline>,
    filter: Arc<AttributeFilter>,
    resolver: OperationResolver,
    next_call_id: AtomicU64,
    default_timeout: Duration,
    default_response_max: usize,
    default_max_depth: usize,
    ceiling: usize,
}

impl InvocationDispatcher {
    /// Dispatcher backed by the blocking executor.
    #[must_use]
    pub fn new(config: &GatewayConfig, filter: Arc<AttributeFilter>) -> Self {
        Self::with_pipeline(
            build_invocation_pipeline(InvocationExecutor, config),
            config,
            filter,
        )
    }

    #[must_use]
    pub fn with_pipeline(
        pipeline: InvocationPipeline,
        config: &GatewayConfig,
        filter: Arc<AttributeFilter>,
    ) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
            filter,
            resolver: OperationResolver,
            next_call_id: AtomicU64::new(1),
            default_timeout: config.default_invoke_timeout,
            default_response_max: config.default_response_max,
            default_max_depth: config.default_max_depth,
            ceiling: config.document_ceiling,
        }
    }

    /// Locates the target, resolves the overload and invokes it.
    ///
    /// Without a `registry` attribute every registry is searched.
    pub async fn handle(
        &self,
        registries: &RegistrySet,
        request: InvocationRequest,
        limits: InvokeLimits,
    ) -> InvocationOutcome {
        let glob = match request.registry.as_deref().map(Glob::new).transpose() {
            Ok(glob) => glob.unwrap_or_else(Glob::any),
            Err(err) => return Self::failed(&GatewayError::from(err)),
        };
        let (registry, target) = match registries.locate_one(&glob, &request.resource).await {
            Ok(found) => found,
            Err(err) => return Self::failed(&err),
        };

        let signature = match self.resolver.resolve(
            target.name.canonical(),
            target.resource.operations(),
            &request.operation,
            &request.parameters,
        ) {
            Ok(signature) => signature,
            Err(err) => return Self::failed(&err),
        };

        debug!(
            registry = %registry,
            resource = target.name.canonical(),
            operation = %signature.name,
            arity = signature.arity(),
            "dispatching invocation"
        );
        self.invoke(&registry, target, signature, &request.parameters, limits)
            .await
    }

    /// Coerces `params`, runs the operation and renders its result.
    pub async fn invoke(
        &self,
        registry: &str,
        target: NamedResource,
        signature: OperationSignature,
        params: &[ParameterSpec],
        limits: InvokeLimits,
    ) -> InvocationOutcome {
        let args = match coerce_arguments(&signature, params) {
            Ok(args) => args,
            Err(err) => return Self::failed(&err),
        };

        let timeout = limits.max_time.unwrap_or(self.default_timeout);
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let invocation = Invocation {
            ctx: InvocationContext::new(
                call_id,
                target.name.canonical(),
                signature.name.clone(),
                timeout,
            ),
            target: target.resource,
            signature,
            args,
        };
        let signature = invocation.signature.clone();

        let pipeline = self.pipeline.lock().clone();
        let value = match pipeline.oneshot(invocation).await {
            Ok(value) => value,
            Err(err) => return Self::failed(&err),
        };

        if signature.is_void() {
            return InvocationOutcome::Success { result: None };
        }
        let limit = limits
            .max_size
            .unwrap_or(self.default_response_max)
            .min(self.ceiling);
        match self.render_result(registry, &signature, &value, limit) {
            Ok(node) => InvocationOutcome::Success { result: Some(node) },
            Err(err) => Self::failed(&err),
        }
    }

    /// Renders `value` and checks the rendered `Result` fragment against
    /// `limit`.
    fn render_result(
        &self,
        registry: &str,
        signature: &OperationSignature,
        value: &Value,
        limit: usize,
    ) -> Result<Node, GatewayError> {
        let too_large = |reached: usize| GatewayError::ResponseTooLarge {
            size: reached,
            limit,
        };

        let node = if let Value::Null = value {
            Node::null(RESULT_NAME, signature.return_type.as_str())
        } else {
            let scoped = self.filter.scoped(registry);
            let limits = WalkLimits {
                max_depth: self.default_max_depth,
                ..WalkLimits::default()
            };
            GraphWalker::new(limits, self.ceiling)
                .with_filter(&scoped)
                .walk_value(RESULT_NAME, value)
                .map_err(|e| too_large(e.reached))?
        };

        let mut w = DocumentWriter::new(limit);
        write_result(&mut w, &node).map_err(|e| too_large(e.reached))?;
        Ok(node)
    }

    fn failed(err: &GatewayError) -> InvocationOutcome {
        warn!(kind = err.kind(), error = %err, "invocation failed");
        InvocationOutcome::error(err)
    }
}

/// Converts wire parameters to the signature's declared types.
///
/// # Errors
///
/// `ParameterTypeInvalid` for a declared type no value can carry,
/// `ParameterValueInvalid` for text that does not convert.
pub fn coerce_arguments(
    signature: &OperationSignature,
    params: &[ParameterSpec],
) -> Result<Vec<Value>, GatewayError> {
    signature
        .parameters
        .iter()
        .zip(params)
        .enumerate()
        .map(|(index, (declared, param))| {
            coerce(&param.value, &declared.type_name).map_err(|source| match source {
                CoerceError::UnknownType(type_name) | CoerceError::VoidParameter(type_name) => {
                    GatewayError::ParameterTypeInvalid { index, type_name }
                }
                source => GatewayError::ParameterValueInvalid { index, source },
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use mxgate_core::{NamePattern, NodeBody};

    use super::*;
    use crate::service::filter::FilterRule;
    use crate::service::registry::InMemoryRegistry;
    use crate::testing::{name, Bean};

    fn dispatcher() -> InvocationDispatcher {
        InvocationDispatcher::new(&GatewayConfig::default(), Arc::new(AttributeFilter::empty()))
    }

    fn registries() -> RegistrySet {
        let app = InMemoryRegistry::new("app");
        app.register(name("app:type=Svc"), Arc::new(Bean::service("Svc")))
            .unwrap();
        app.register(name("app:type=Pool,id=1"), Arc::new(Bean::service("Pool")))
            .unwrap();
        app.register(name("app:type=Pool,id=2"), Arc::new(Bean::service("Pool")))
            .unwrap();
        let set = RegistrySet::new();
        set.register(Arc::new(app)).unwrap();
        set
    }

    fn request(resource: &str, operation: &str, params: Vec<ParameterSpec>) -> InvocationRequest {
        InvocationRequest {
            registry: None,
            resource: NamePattern::parse(resource).unwrap(),
            operation: operation.to_string(),
            parameters: params,
        }
    }

    async fn call(operation: &str, params: Vec<ParameterSpec>, limits: InvokeLimits) -> InvocationOutcome {
        dispatcher()
            .handle(&registries(), request("app:type=Svc", operation, params), limits)
            .await
    }

    fn result_text(outcome: &InvocationOutcome) -> Option<&str> {
        match outcome {
            InvocationOutcome::Success { result: Some(node) } => node.text(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn adds_two_ints() {
        let outcome = call(
            "add",
            vec![ParameterSpec::new("int", "2"), ParameterSpec::new("int", " 3 ")],
            InvokeLimits::default(),
        )
        .await;
        assert_eq!(result_text(&outcome), Some("5"));
        if let InvocationOutcome::Success { result: Some(node) } = &outcome {
            assert_eq!(node.type_name, "int");
        }
    }

    #[tokio::test]
    async fn sleeping_past_max_time_times_out() {
        let limits = InvokeLimits {
            max_time: Some(Duration::from_millis(20)),
            max_size: None,
        };
        let outcome = call("sleep", vec![ParameterSpec::new("long", "400")], limits).await;
        assert_eq!(outcome.error_kind(), Some("InvocationTimeout"));
    }

    #[tokio::test]
    async fn oversized_result_is_rejected() {
        let limits = InvokeLimits {
            max_time: None,
            max_size: Some(64),
        };
        let outcome = call("big", vec![ParameterSpec::new("int", "1000")], limits).await;
        assert_eq!(outcome.error_kind(), Some("ResponseTooLarge"));

        let outcome = call("big", vec![ParameterSpec::new("int", "3")], limits).await;
        assert_eq!(result_text(&outcome), Some("xxx"));
    }

    #[tokio::test]
    async fn unknown_operation_is_not_found() {
        let outcome = call("nope", Vec::new(), InvokeLimits::default()).await;
        assert_eq!(outcome.error_kind(), Some("OperationNotFound"));
    }

    #[tokio::test]
    async fn empty_numeric_value_is_invalid() {
        let outcome = call("echo", vec![ParameterSpec::new("int", "")], InvokeLimits::default()).await;
        assert_eq!(outcome.error_kind(), Some("ParameterValueInvalid"));
    }

    #[tokio::test]
    async fn empty_text_value_is_accepted() {
        let outcome = call("echo", vec![ParameterSpec::new("string", "")], InvokeLimits::default()).await;
        assert_eq!(result_text(&outcome), Some("string:"));
    }

    #[tokio::test]
    async fn overloads_select_by_type() {
        let outcome = call("echo", vec![ParameterSpec::new("int", "7")], InvokeLimits::default()).await;
        assert_eq!(result_text(&outcome), Some("int:7"));
        let outcome = call("echo", vec![ParameterSpec::new("String", "7")], InvokeLimits::default()).await;
        assert_eq!(result_text(&outcome), Some("string:7"));
    }

    #[tokio::test]
    async fn void_operation_has_no_result() {
        let outcome = call("noop", Vec::new(), InvokeLimits::default()).await;
        assert_eq!(outcome, InvocationOutcome::Success { result: None });
    }

    #[tokio::test]
    async fn callee_failure_becomes_error_outcome() {
        let outcome = call("fail", Vec::new(), InvokeLimits::default()).await;
        assert_eq!(outcome.error_kind(), Some("InvocationFailed"));
    }

    #[tokio::test]
    async fn composite_result_is_walked() {
        let outcome = call("describe", Vec::new(), InvokeLimits::default()).await;
        let InvocationOutcome::Success { result: Some(node) } = outcome else {
            panic!("expected a result");
        };
        assert_eq!(node.type_name, "Summary");
        assert!(matches!(node.body, NodeBody::Children(_)));
        assert_eq!(node.child("count").and_then(Node::text), Some("2"));
    }

    #[test]
    fn filter_applies_to_identified_results() {
        let filter = AttributeFilter::with_rules(&[FilterRule::new("app", "app:type=Summary", "label")])
            .unwrap();
        let dispatcher = InvocationDispatcher::new(&GatewayConfig::default(), Arc::new(filter));
        let value = Value::object(
            Bean::scalars("Summary", vec![("label", Value::from("hidden")), ("count", Value::Int(1))])
                .identified("app:type=Summary"),
        );
        let node = dispatcher
            .render_result("app", &OperationSignature::new("x", "Summary"), &value, 4096)
            .unwrap();
        assert!(node.child("label").is_none());
        assert!(node.child("count").is_some());
    }

    #[tokio::test]
    async fn ambiguous_target_is_reported() {
        let outcome = dispatcher()
            .handle(
                &registries(),
                request("app:type=Pool,*", "noop", Vec::new()),
                InvokeLimits::default(),
            )
            .await;
        assert_eq!(outcome.error_kind(), Some("ResourceAmbiguous"));
    }

    #[tokio::test]
    async fn missing_target_is_reported() {
        let outcome = dispatcher()
            .handle(
                &registries(),
                request("app:type=Missing", "noop", Vec::new()),
                InvokeLimits::default(),
            )
            .await;
        assert_eq!(outcome.error_kind(), Some("ResourceNotFound"));
    }

    #[tokio::test]
    async fn wrong_arity_is_reported() {
        let outcome = call("add", vec![ParameterSpec::new("int", "1")], InvokeLimits::default()).await;
        assert_eq!(outcome.error_kind(), Some("ParameterCountMismatch"));
    }

    #[test]
    fn invoke_limits_parse() {
        let limits = InvokeLimits::parse(Some("250"), Some("10")).unwrap();
        assert_eq!(limits.max_time, Some(Duration::from_millis(250)));
        assert_eq!(limits.max_size, Some(10));
        assert!(matches!(
            InvokeLimits::parse(Some("-1"), None),
            Err(GatewayError::InvalidOverride { parameter: "maxTime", .. })
        ));
    }

    #[test]
    fn void_parameter_type_is_invalid() {
        let signature = OperationSignature::new("odd", "int").param("v", "void");
        let err = coerce_arguments(&signature, &[ParameterSpec::new("void", "")]).unwrap_err();
        assert!(matches!(err, GatewayError::ParameterTypeInvalid { index: 0, .. }));
    }
}
