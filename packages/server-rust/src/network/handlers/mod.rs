//! HTTP handlers for the gateway.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors), the error-to-response mapping, and re-exports all handler
//! functions for building the router.

pub mod filters;
pub mod health;
pub mod invoke;
pub mod resources;

pub use filters::reload_filters_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use invoke::invoke_handler;
pub use resources::{resource_handler, resources_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::{NetworkConfig, ShutdownController};
use crate::error::GatewayError;
use crate::service::Gateway;

/// Content type of every document the gateway produces.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Registries, filter, serializer and dispatcher.
    pub gateway: Arc<Gateway>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

/// A rendered XML document.
pub(crate) fn xml_response(document: String) -> Response {
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], document).into_response()
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "request failed");
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Gateway with an `app` registry holding a `Bean::service("Svc")` as
/// `app:type=Svc`.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::service::{GatewayConfig, InMemoryRegistry};
    use crate::testing::{name, Bean};

    let gateway = Gateway::new(GatewayConfig::default()).unwrap();
    let app = InMemoryRegistry::new("app");
    app.register(name("app:type=Svc"), Arc::new(Bean::service("Svc")))
        .unwrap();
    gateway.register_registry(Arc::new(app)).unwrap();
    AppState {
        gateway: Arc::new(gateway),
        shutdown: Arc::new(ShutdownController::new()),
        config: Arc::new(NetworkConfig::default()),
        start_time: Instant::now(),
    }
}
