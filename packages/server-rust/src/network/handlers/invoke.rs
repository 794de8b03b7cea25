//! `POST /invoke`: decode an invocation request and return its outcome.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde::Deserialize;

use super::{xml_response, AppState};
use crate::error::GatewayError;
use crate::service::InvokeLimits;

/// Header carrying the declared request length in characters.
pub const REQUEST_LENGTH_HEADER: &str = "x-request-length";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeParams {
    /// Deadline in milliseconds.
    pub max_time: Option<String>,
    /// Cap on the rendered result, in bytes.
    pub max_size: Option<String>,
}

/// Request faults answer 400 (413 when too large) with a text body;
/// everything past decoding answers 200 with an outcome document.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Query(params): Query<InvokeParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if !state.shutdown.is_accepting() {
        return Err(GatewayError::Overloaded);
    }
    let _in_flight = state.shutdown.in_flight_guard();

    let limits = InvokeLimits::parse(params.max_time.as_deref(), params.max_size.as_deref())?;
    let declared = declared_length(&headers, &body)?;
    let reader = (!body.is_empty()).then_some(body.as_ref());

    let outcome = state.gateway.invoke(reader, declared, limits).await?;
    let document = state.gateway.outcome_document(&outcome)?;
    Ok(xml_response(document))
}

/// Declared length from `X-Request-Length`, else the character count of
/// the body (`Content-Length` counts bytes, not characters).
fn declared_length(headers: &HeaderMap, body: &Bytes) -> Result<i64, GatewayError> {
    if let Some(value) = headers.get(REQUEST_LENGTH_HEADER) {
        return value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                GatewayError::RequestMalformed(format!("invalid {REQUEST_LENGTH_HEADER} header"))
            });
    }
    if body.is_empty() {
        return Ok(0);
    }
    let text = std::str::from_utf8(body).map_err(|err| {
        GatewayError::RequestMalformed(format!(
            "request body is not valid UTF-8 at byte {}",
            err.valid_up_to()
        ))
    })?;
    Ok(i64::try_from(text.chars().count()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn explicit_length_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_LENGTH_HEADER, HeaderValue::from_static("4"));
        let body = Bytes::from_static(b"<Invoke/>");
        assert_eq!(declared_length(&headers, &body).unwrap(), 4);
    }

    #[test]
    fn negative_length_header_passes_through() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_LENGTH_HEADER, HeaderValue::from_static("-3"));
        assert_eq!(declared_length(&headers, &Bytes::new()).unwrap(), -3);
    }

    #[test]
    fn body_length_counts_characters() {
        let body = Bytes::from("<Invoke>é</Invoke>");
        assert_eq!(declared_length(&HeaderMap::new(), &body).unwrap(), 18);
        assert_eq!(declared_length(&HeaderMap::new(), &Bytes::new()).unwrap(), 0);
    }

    #[test]
    fn body_length_rejects_invalid_utf8() {
        let body = Bytes::from_static(b"<Invoke>\xFF\xFE</Invoke>");
        assert!(matches!(
            declared_length(&HeaderMap::new(), &body),
            Err(GatewayError::RequestMalformed(_))
        ));
    }

    #[test]
    fn garbage_length_header_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_LENGTH_HEADER, HeaderValue::from_static("ten"));
        assert!(matches!(
            declared_length(&headers, &Bytes::new()),
            Err(GatewayError::RequestMalformed(_))
        ));
    }
}
