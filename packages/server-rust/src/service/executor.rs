//! Innermost pipeline service: runs the callee on the blocking pool.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use mxgate_core::Value;
use tower::Service;
use tracing::debug;

use super::invocation::Invocation;
use crate::error::GatewayError;

/// Executes invocations with `spawn_blocking` so a blocking callee cannot
/// stall the async runtime.
///
/// Dropping the returned future (for example when the timeout layer gives
/// up) detaches the blocking task: the callee runs to completion in the
/// background and its result is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationExecutor;

impl Service<Invocation> for InvocationExecutor {
    type Response = Value;
    type Error = GatewayError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, GatewayError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        let Invocation {
            ctx,
            target,
            signature,
            args,
        } = inv;
        let handle = tokio::task::spawn_blocking(move || target.invoke(&signature, args));

        Box::pin(async move {
            match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => {
                    debug!(call_id = ctx.call_id, error = %err, "callee returned an error");
                    Err(GatewayError::InvocationFailed(format!("{err:#}")))
                }
                Err(join) => Err(GatewayError::InvocationFailed(if join.is_panic() {
                    "operation panicked".to_string()
                } else {
                    join.to_string()
                })),
            }
        })
    }
}
