//! Timeout middleware for invocations.
//!
//! Stops waiting for invocations that exceed their context deadline and
//! fails them with `GatewayError::InvocationTimeout`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use mxgate_core::Value;
use tower::{Layer, Service};
use tracing::warn;

use crate::error::GatewayError;
use crate::service::invocation::Invocation;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-invocation deadlines.
///
/// The deadline is read from each invocation's `ctx.timeout`, so callers
/// can shorten or extend it per request.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-invocation deadlines.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Invocation> for TimeoutService<S>
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
        let timeout = inv.ctx().timeout;
        let timeout_ms = inv.ctx().timeout_ms();
        let call_id = inv.ctx().call_id;
        let fut = self.inner.call(inv);
        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(call_id, timeout_ms, "invocation abandoned after deadline");
                    Err(GatewayError::InvocationTimeout { timeout_ms })
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tower::ServiceExt;

    use super::*;
    use crate::service::middleware::test_support::{make_invocation, SlowService};

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let value = svc.oneshot(make_invocation(1, 1000)).await.unwrap();
        assert_eq!(value, Value::Long(1));
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_invocation(1, 50)).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvocationTimeout { timeout_ms: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_does_not_wait_for_callee() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 60_000 });
        let started = tokio::time::Instant::now();
        let err = svc.oneshot(make_invocation(1, 100)).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvocationTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
