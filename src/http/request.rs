//! Inbound request helpers.
//!
//! Request ids are assigned by `tower_http::request_id` in the server's
//! middleware stack; handlers only read them back for log correlation.

use axum::http::{HeaderMap, HeaderName};

/// Inbound request id header.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id set by the middleware, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Optional `X-API-Version` value, ignored when not valid text.
pub fn api_version(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(crate::client::api::X_API_VERSION)
        .and_then(|v| v.to_str().ok())
}
