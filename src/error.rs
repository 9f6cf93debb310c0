//! Typed failures of the proxy call path.
//!
//! # Taxonomy
//! - NotFound / Unauthorized / ClientError / DownstreamFailure: translated
//!   from the backend's HTTP status by the response interceptor
//! - Timeout: one of the transport legs (connect, response, read, write)
//! - CircuitOpen: the breaker rejected the call before any network attempt
//!
//! Translation happens exactly once, at the transport boundary. Handlers
//! propagate with `?` and the inbound response carries the translated status
//! and message unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::resilience::timeouts::TimeoutLeg;

/// Result alias for the proxy call path.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Coarse classification of a [`ProxyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    ClientError,
    DownstreamFailure,
    Timeout,
    CircuitOpen,
    NoInstances,
    Transport,
    Decode,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::ClientError => "client_error",
            ErrorKind::DownstreamFailure => "downstream_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::NoInstances => "no_instances",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

/// Failure of one proxied call.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Backend answered 404.
    #[error("User not found (404)")]
    NotFound,

    /// Backend answered 401.
    #[error("Unauthorized (401)")]
    Unauthorized,

    /// Backend answered any other 4xx.
    #[error("Client error: {0}")]
    ClientError(u16),

    /// Backend answered 5xx.
    #[error("Server error: {0}")]
    DownstreamFailure(u16),

    /// A transport leg exceeded its deadline.
    #[error("{0} timeout elapsed")]
    Timeout(TimeoutLeg),

    /// The named circuit breaker is not permitting calls.
    #[error("circuit breaker '{0}' does not permit further calls")]
    CircuitOpen(String),

    /// Discovery returned no instance for the service.
    #[error("no instances available for service '{0}'")]
    NoInstances(String),

    /// Connection refused, reset, protocol error and the like.
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend body could not be decoded.
    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The outbound request could not be built.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::NotFound => ErrorKind::NotFound,
            ProxyError::Unauthorized => ErrorKind::Unauthorized,
            ProxyError::ClientError(_) => ErrorKind::ClientError,
            ProxyError::DownstreamFailure(_) => ErrorKind::DownstreamFailure,
            ProxyError::Timeout(_) => ErrorKind::Timeout,
            ProxyError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            ProxyError::NoInstances(_) => ErrorKind::NoInstances,
            ProxyError::Transport(_) => ErrorKind::Transport,
            ProxyError::Decode(_) => ErrorKind::Decode,
            ProxyError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Backend status code carried by the failure, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            ProxyError::NotFound => Some(404),
            ProxyError::Unauthorized => Some(401),
            ProxyError::ClientError(code) | ProxyError::DownstreamFailure(code) => Some(*code),
            _ => None,
        }
    }

    /// Translate a backend status into a typed failure.
    /// Returns `None` for 1xx, 2xx and 3xx.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status.as_u16() {
            404 => Some(ProxyError::NotFound),
            401 => Some(ProxyError::Unauthorized),
            code @ 400..=499 => Some(ProxyError::ClientError(code)),
            code @ 500..=599 => Some(ProxyError::DownstreamFailure(code)),
            _ => None,
        }
    }

    /// Status returned to the inbound caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::ClientError(code) | ProxyError::DownstreamFailure(code) => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::CircuitOpen(_) | ProxyError::NoInstances(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProxyError::Transport(_) | ProxyError::Decode(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error: &'static str,
    message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(
            status = status.as_u16(),
            kind = self.kind().as_str(),
            error = %self,
            "Returning error response"
        );
        let body = ErrorBody {
            status: status.as_u16(),
            error: self.kind().as_str(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_translation_table() {
        assert!(matches!(ProxyError::from_status(StatusCode::NOT_FOUND), Some(ProxyError::NotFound)));
        assert!(matches!(ProxyError::from_status(StatusCode::UNAUTHORIZED), Some(ProxyError::Unauthorized)));

        for code in 400u16..=499 {
            if code == 401 || code == 404 {
                continue;
            }
            let status = StatusCode::from_u16(code).unwrap();
            match ProxyError::from_status(status) {
                Some(ProxyError::ClientError(c)) => assert_eq!(c, code),
                other => panic!("{} translated to {:?}", code, other),
            }
        }

        for code in 500u16..=599 {
            let status = StatusCode::from_u16(code).unwrap();
            match ProxyError::from_status(status) {
                Some(ProxyError::DownstreamFailure(c)) => assert_eq!(c, code),
                other => panic!("{} translated to {:?}", code, other),
            }
        }

        for code in [200u16, 201, 204, 301, 302, 304] {
            assert!(ProxyError::from_status(StatusCode::from_u16(code).unwrap()).is_none());
        }
    }

    #[test]
    fn test_messages_are_preserved() {
        assert_eq!(ProxyError::NotFound.to_string(), "User not found (404)");
        assert_eq!(ProxyError::Unauthorized.to_string(), "Unauthorized (401)");
        assert_eq!(ProxyError::ClientError(418).to_string(), "Client error: 418");
        assert_eq!(ProxyError::DownstreamFailure(503).to_string(), "Server error: 503");
    }

    #[test]
    fn test_inbound_status_mapping() {
        assert_eq!(ProxyError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ProxyError::ClientError(422).status().as_u16(), 422);
        assert_eq!(ProxyError::DownstreamFailure(500).status().as_u16(), 500);
        assert_eq!(ProxyError::Timeout(TimeoutLeg::Read).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ProxyError::CircuitOpen("backendService".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ProxyError::Transport("reset".into()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_kind_and_code() {
        assert_eq!(ProxyError::ClientError(409).kind(), ErrorKind::ClientError);
        assert_eq!(ProxyError::ClientError(409).code(), Some(409));
        assert_eq!(ProxyError::Timeout(TimeoutLeg::Connect).kind(), ErrorKind::Timeout);
        assert_eq!(ProxyError::Timeout(TimeoutLeg::Connect).code(), None);
    }
}
