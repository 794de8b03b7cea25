//! Resource document endpoints: `GET /resources` and `GET /resource`.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::{xml_response, AppState};
use crate::error::GatewayError;
use crate::service::QueryOverrides;

/// Query string shared by both endpoints. Bounds arrive as raw text so
/// invalid values surface as `InvalidOverride` instead of a generic
/// extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceParams {
    /// Name pattern for `/resources`; every resource when absent.
    pub query: Option<String>,
    /// Concrete resource name for `/resource`.
    pub name: Option<String>,
    /// Glob over registry ids; every registry when absent.
    pub registry: Option<String>,
    pub max_depth: Option<String>,
    pub max_count: Option<String>,
    pub max_size: Option<String>,
}

impl ResourceParams {
    fn overrides(&self) -> Result<QueryOverrides, GatewayError> {
        QueryOverrides::parse(
            self.max_depth.as_deref(),
            self.max_count.as_deref(),
            self.max_size.as_deref(),
        )
    }
}

/// Multi-resource document for every match of `query`.
pub async fn resources_handler(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
) -> Result<Response, GatewayError> {
    let overrides = params.overrides()?;
    let query = params.query.as_deref().unwrap_or("*");
    let document = state
        .gateway
        .resources(query, params.registry.as_deref(), &overrides)
        .await?;
    Ok(xml_response(document))
}

/// Single-resource document for `name`.
pub async fn resource_handler(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
) -> Result<Response, GatewayError> {
    let overrides = params.overrides()?;
    let Some(name) = params.name.as_deref() else {
        return Err(GatewayError::RequestMalformed(
            "missing name parameter".to_string(),
        ));
    };
    let document = state
        .gateway
        .resource(name, params.registry.as_deref(), &overrides)
        .await?;
    Ok(xml_response(document))
}
