//! Request and response interceptors.
//!
//! The pipeline runs request interceptors in registration order just before
//! dispatch, and response interceptors in registration order before the
//! caller sees the response. The standard pipeline is:
//!
//! ```text
//! request:  CorrelationId → BearerAuth → Logging
//! response: Logging → StatusTranslator
//! ```

use axum::body::Body;
use axum::http::{header, response, HeaderName, HeaderValue, Request};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ProxyError, Result};

/// Header carrying the per-call correlation id.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Hook into every outbound exchange.
pub trait Interceptor: Send + Sync {
    /// Inspect or modify the request before sending.
    fn on_request(&self, _request: &mut Request<Body>) -> Result<()> {
        Ok(())
    }

    /// Inspect the response head; returning an error replaces the response.
    fn on_response(&self, _response: &response::Parts) -> Result<()> {
        Ok(())
    }
}

/// Stamps a fresh UUID v4 correlation id on every request.
#[derive(Debug, Clone, Default)]
pub struct CorrelationId;

impl Interceptor for CorrelationId {
    fn on_request(&self, request: &mut Request<Body>) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let value = HeaderValue::from_str(&id)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        request.headers_mut().insert(X_CORRELATION_ID, value);
        Ok(())
    }
}

/// Adds `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    value: Option<HeaderValue>,
}

impl BearerAuth {
    pub fn new(token: Option<String>) -> Self {
        let value = token.and_then(|t| match HeaderValue::from_str(&format!("Bearer {}", t)) {
            Ok(mut v) => {
                v.set_sensitive(true);
                Some(v)
            }
            Err(_) => {
                tracing::error!("Configured bearer token is not a valid header value, sending no Authorization");
                None
            }
        });
        if value.is_none() {
            tracing::warn!(
                "No backend bearer token configured, outbound calls carry no proxy Authorization"
            );
        }
        Self { value }
    }
}

impl Interceptor for BearerAuth {
    fn on_request(&self, request: &mut Request<Body>) -> Result<()> {
        if let Some(value) = &self.value {
            request.headers_mut().insert(header::AUTHORIZATION, value.clone());
        }
        Ok(())
    }
}

/// Translates error statuses into typed failures.
#[derive(Debug, Clone, Default)]
pub struct StatusTranslator;

impl Interceptor for StatusTranslator {
    fn on_response(&self, response: &response::Parts) -> Result<()> {
        match ProxyError::from_status(response.status) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Debug-level exchange logging.
#[derive(Debug, Clone, Default)]
pub struct Logging;

impl Interceptor for Logging {
    fn on_request(&self, request: &mut Request<Body>) -> Result<()> {
        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            correlation_id = ?request.headers().get(&X_CORRELATION_ID),
            "Sending backend request"
        );
        Ok(())
    }

    fn on_response(&self, response: &response::Parts) -> Result<()> {
        tracing::debug!(status = %response.status, "Received backend response");
        Ok(())
    }
}

/// Ordered request and response interceptors of one client.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    request: Vec<Arc<dyn Interceptor>>,
    response: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlation id, bearer auth, logging and status translation.
    pub fn standard(token: Option<String>) -> Self {
        let logging = Arc::new(Logging);
        Self::new()
            .request(Arc::new(CorrelationId))
            .request(Arc::new(BearerAuth::new(token)))
            .request(logging.clone())
            .response(logging)
            .response(Arc::new(StatusTranslator))
    }

    /// Append a request interceptor.
    pub fn request(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.request.push(interceptor);
        self
    }

    /// Append a response interceptor.
    pub fn response(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.response.push(interceptor);
        self
    }

    pub fn apply_request(&self, request: &mut Request<Body>) -> Result<()> {
        self.request.iter().try_for_each(|i| i.on_request(request))
    }

    pub fn apply_response(&self, response: &response::Parts) -> Result<()> {
        self.response.iter().try_for_each(|i| i.on_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Response, StatusCode};
    use parking_lot::Mutex;
    use std::collections::HashSet;

    fn request() -> Request<Body> {
        Request::builder()
            .uri("http://backend/api/v1/ping")
            .header(header::AUTHORIZATION, "Bearer inbound")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let pipeline = InterceptorPipeline::standard(None);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let mut req = request();
            pipeline.apply_request(&mut req).unwrap();
            let id = req.headers()[&X_CORRELATION_ID].to_str().unwrap().to_string();
            assert!(Uuid::parse_str(&id).is_ok());
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_bearer_token_overrides_inbound() {
        let pipeline = InterceptorPipeline::standard(Some("secret".into()));
        let mut req = request();
        pipeline.apply_request(&mut req).unwrap();
        let values: Vec<_> = req.headers().get_all(header::AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "Bearer secret");
    }

    #[test]
    fn test_no_token_leaves_headers_alone() {
        let pipeline = InterceptorPipeline::standard(None);
        let mut req = request();
        pipeline.apply_request(&mut req).unwrap();
        assert_eq!(req.headers()[header::AUTHORIZATION], "Bearer inbound");
    }

    #[test]
    fn test_response_translation() {
        let pipeline = InterceptorPipeline::standard(None);
        let response = |code: u16| {
            Response::builder()
                .status(StatusCode::from_u16(code).unwrap())
                .body(())
                .unwrap()
                .into_parts()
                .0
        };

        assert!(pipeline.apply_response(&response(200)).is_ok());
        assert!(pipeline.apply_response(&response(302)).is_ok());
        assert!(matches!(pipeline.apply_response(&response(404)), Err(ProxyError::NotFound)));
        assert!(matches!(pipeline.apply_response(&response(401)), Err(ProxyError::Unauthorized)));
        assert!(matches!(pipeline.apply_response(&response(429)), Err(ProxyError::ClientError(429))));
        assert!(matches!(pipeline.apply_response(&response(502)), Err(ProxyError::DownstreamFailure(502))));
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Interceptor for Recorder {
        fn on_request(&self, request: &mut Request<Body>) -> Result<()> {
            let auth = request.headers().get(header::AUTHORIZATION).cloned();
            self.seen.lock().push(format!("{:?}", auth));
            Ok(())
        }

        fn on_response(&self, response: &response::Parts) -> Result<()> {
            self.seen.lock().push(response.status.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_custom_interceptors_run_in_order() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = InterceptorPipeline::new()
            .request(Arc::new(BearerAuth::new(Some("abc".into()))))
            .request(recorder.clone())
            .response(Arc::new(StatusTranslator))
            .response(recorder.clone());

        let mut req = request();
        pipeline.apply_request(&mut req).unwrap();
        assert_eq!(recorder.seen.lock().as_slice(), ["Some(Sensitive)"]);

        // The translator short-circuits before later interceptors.
        let (parts, _) = Response::builder().status(500).body(()).unwrap().into_parts();
        assert!(pipeline.apply_response(&parts).is_err());
        assert_eq!(recorder.seen.lock().len(), 1);

        let (parts, _) = Response::builder().status(200).body(()).unwrap().into_parts();
        pipeline.apply_response(&parts).unwrap();
        assert_eq!(recorder.seen.lock().last().map(String::as_str), Some("200 OK"));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warnings_while(f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_missing_token_is_warned() {
        let logs = warnings_while(|| {
            BearerAuth::new(None);
        });
        assert!(logs.contains("No backend bearer token configured"));

        let logs = warnings_while(|| {
            BearerAuth::new(Some("secret".into()));
        });
        assert!(logs.is_empty());
    }
}
