//! Metrics middleware for invocations.
//!
//! Records invocation duration and outcome on a `tracing` span and in the
//! `mxgate_invocations_total` / `mxgate_invocation_duration_ms` metrics.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use mxgate_core::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::error::GatewayError;
use crate::service::invocation::Invocation;

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments invocations with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records invocation duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Outcome label: `ok` or the error kind.
fn outcome_label(result: &Result<Value, GatewayError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    }
}

impl<S> Service<Invocation> for MetricsService<S>
where
    S: Service<Invocation, Response = Value, Error = GatewayError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = GatewayError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        let call_id = inv.ctx().call_id;
        let span = info_span!(
            "invocation",
            call_id = call_id,
            resource = %inv.ctx().resource,
            operation = %inv.ctx().operation,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(inv);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = start.elapsed().as_millis();
                let outcome = outcome_label(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_u64 = duration_ms as u64;
                tracing::Span::current().record("duration_ms", duration_u64);
                tracing::Span::current().record("outcome", outcome);

                metrics::counter!("mxgate_invocations_total", "outcome" => outcome).increment(1);
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!("mxgate_invocation_duration_ms").record(duration_u64 as f64);

                tracing::info!(
                    call_id = call_id,
                    duration_ms = duration_u64,
                    outcome = outcome,
                    "invocation complete"
                );

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::service::middleware::test_support::{make_invocation, SlowService};

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(SlowService { delay_ms: 0 });
        let value = svc.oneshot(make_invocation(42, 5000)).await.unwrap();
        assert_eq!(value, Value::Long(42));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label(&Ok(Value::Null)), "ok");
        assert_eq!(
            outcome_label(&Err(GatewayError::InvocationTimeout { timeout_ms: 1 })),
            "InvocationTimeout"
        );
    }
}
