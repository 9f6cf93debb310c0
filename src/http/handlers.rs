//! `/proxy` route handlers.
//!
//! Each handler forwards to one backend operation and hands the backend's
//! status and body back unchanged. Failures propagate as [`ProxyError`],
//! which renders itself.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;

use crate::client::UserDbDto;
use crate::error::ProxyError;
use crate::http::request::{api_version, request_id};
use crate::http::response::{json_reply, text_reply};
use crate::http::server::AppState;
use crate::http::upload::zero_stream;

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(user): Json<UserDbDto>,
) -> Result<Response, ProxyError> {
    tracing::debug!(request_id = %request_id(&headers), username = ?user.username, "Create user");
    let reply = state.users.create(&user).await?;
    Ok(json_reply(reply))
}

/// Guarded by the circuit breaker; a rejected call is a bare 503.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let version = api_version(&headers);
    tracing::debug!(request_id = %request_id(&headers), id, version = ?version, "Get user");

    let users = state.users.clone();
    match state.breaker.call(|| async move { users.get_by_id(id, version).await }).await {
        Ok(reply) => Ok(json_reply(reply)),
        Err(ProxyError::CircuitOpen(name)) => {
            tracing::warn!(request_id = %request_id(&headers), breaker = %name, "Get user rejected");
            Ok(StatusCode::SERVICE_UNAVAILABLE.into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn get_user_with_data(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    tracing::debug!(request_id = %request_id(&headers), id, "Get user with data");
    let reply = state.users.get_with_data(id, &headers).await?;
    Ok(json_reply(reply))
}

pub async fn proxy_http_status(
    State(state): State<AppState>,
    Path(code): Path<u16>,
) -> Result<Response, ProxyError> {
    let reply = state.users.http_status(code).await?;
    Ok(text_reply(reply))
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<HashMap<String, String>>, ProxyError> {
    Ok(Json(state.users.ping().await?))
}

/// Streams the synthetic payload; the backend's status comes back bodiless.
pub async fn upload(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ProxyError> {
    let total = state.upload.synthetic_size_bytes;
    tracing::info!(
        request_id = %request_id(&headers),
        bytes = total,
        chunk = state.upload.chunk_size_bytes,
        "Starting synthetic upload"
    );

    let (body, sent) = zero_stream(total, state.upload.chunk_size_bytes);
    let status = state.users.upload(body, sent).await?;

    tracing::info!(request_id = %request_id(&headers), status = %status, "Upload finished");
    Ok(status)
}
