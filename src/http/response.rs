//! Backend replies back to the inbound caller.
//!
//! The backend's status is kept as is; a present body is re-encoded, an
//! absent one stays empty.

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::client::BackendReply;

/// JSON pass-through.
pub fn json_reply<T: Serialize>(reply: BackendReply<T>) -> Response {
    match reply.body {
        Some(body) => (reply.status, Json(body)).into_response(),
        None => reply.status.into_response(),
    }
}

/// Plain text pass-through.
pub fn text_reply(reply: BackendReply<String>) -> Response {
    match reply.body {
        Some(body) => (
            reply.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            body,
        )
            .into_response(),
        None => reply.status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_status_preserved_without_body() {
        let response = json_reply::<serde_json::Value>(BackendReply::new(StatusCode::ACCEPTED, None));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_text_reply() {
        let response = text_reply(BackendReply::new(StatusCode::OK, Some("fine".into())));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"fine");
    }
}
