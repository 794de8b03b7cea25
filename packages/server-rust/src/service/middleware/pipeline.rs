//! Pipeline composition: combines all middleware layers into a single service stack.

use mxgate_core::Value;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder};

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::error::GatewayError;
use crate::service::config::GatewayConfig;
use crate::service::invocation::Invocation;

/// Type-erased, cloneable invocation pipeline.
pub type InvocationPipeline = BoxCloneService<Invocation, Value, GatewayError>;

/// Build the invocation pipeline by wrapping `executor` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-invocation deadlines
/// 3. `MetricsLayer` -- record timing and outcome (closest to the callee)
///
/// Clones share the load-shed semaphore.
#[must_use]
pub fn build_invocation_pipeline<S>(executor: S, config: &GatewayConfig) -> InvocationPipeline
where
    S: Service<Invocation, Response = Value, Error = GatewayError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    BoxCloneService::new(
        ServiceBuilder::new()
            .layer(LoadShedLayer::new(config.max_concurrent_invocations))
            .layer(TimeoutLayer)
            .layer(MetricsLayer)
            .service(executor),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
