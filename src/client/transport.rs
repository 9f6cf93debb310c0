//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Own the pooled hyper client and its timeout-enforcing connector
//! - Run the interceptor pipeline around every exchange
//! - Enforce the response deadline
//! - Buffer the backend body and record request metrics
//!
//! # Design Decisions
//! - Request bodies are never buffered here; streaming bodies go out chunked
//! - The response deadline starts once the request body is fully written,
//!   so a long upload is bounded by write inactivity instead

use axum::body::Body;
use axum::http::{response, HeaderMap, Method, Request, StatusCode, Uri};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::client::interceptor::InterceptorPipeline;
use crate::client::io::TimeoutConnector;
use crate::error::{ProxyError, Result};
use crate::observability::metrics;
use crate::resilience::timeouts::{classify_transport_error, TimeoutLeg, Timeouts};

/// One outbound call, addressed relative to the backend base path.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Body,
    /// Fires once a streaming body has been fully produced.
    pub body_sent: Option<oneshot::Receiver<()>>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            body_sent: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn header(mut self, name: axum::http::HeaderName, value: axum::http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Buffered JSON body.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        self.headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        );
        self.body = Body::from(bytes);
        Ok(self)
    }

    /// Streaming body; `sent` must fire when the stream is exhausted.
    pub fn streaming(mut self, body: Body, sent: oneshot::Receiver<()>) -> Self {
        self.body = body;
        self.body_sent = Some(sent);
        self
    }
}

/// Backend response with its body buffered.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Pooled HTTP client bound to one logical service.
#[derive(Clone)]
pub struct Transport {
    client: Client<TimeoutConnector, Body>,
    pipeline: InterceptorPipeline,
    timeouts: Timeouts,
    service_id: Arc<str>,
}

impl Transport {
    pub fn new(
        service_id: &str,
        timeouts: Timeouts,
        pipeline: InterceptorPipeline,
        pool_idle_timeout: Duration,
    ) -> Self {
        let connector = TimeoutConnector::new(&timeouts, service_id);
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(pool_idle_timeout)
            .build(connector);

        Self {
            client,
            pipeline,
            timeouts,
            service_id: Arc::from(service_id),
        }
    }

    /// Perform one exchange against an absolute URI.
    pub async fn send(&self, uri: Uri, request: OutboundRequest) -> Result<BackendResponse> {
        let start = Instant::now();
        let method = request.method.clone();

        let mut builder = Request::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let mut req = builder
            .body(request.body)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        self.pipeline.apply_request(&mut req)?;

        let result = self.exchange(req, request.body_sent).await;

        let status_label = match &result {
            Ok(response) => response.status.as_u16().to_string(),
            Err(ProxyError::Timeout(leg)) => format!("timeout_{}", leg),
            Err(e) => e.code().map_or_else(|| "error".to_string(), |code| code.to_string()),
        };
        metrics::record_backend_request(&self.service_id, method.as_str(), &status_label, start);

        result
    }

    async fn exchange(
        &self,
        req: Request<Body>,
        body_sent: Option<oneshot::Receiver<()>>,
    ) -> Result<BackendResponse> {
        let response_timeout = self.timeouts.response;
        let call = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| classify_transport_error(&e, e.is_connect()))?;
            let (parts, body) = response.into_parts();
            self.pipeline.apply_response(&parts)?;
            buffer(parts, body).await
        };

        let deadline = async move {
            if let Some(sent) = body_sent {
                // A dropped sender means the body ended early; start the clock anyway.
                let _ = sent.await;
            }
            tokio::time::sleep(response_timeout).await;
        };

        tokio::select! {
            result = call => result,
            _ = deadline => {
                tracing::warn!(
                    service = %self.service_id,
                    timeout_ms = response_timeout.as_millis() as u64,
                    "Backend response timeout"
                );
                Err(ProxyError::Timeout(TimeoutLeg::Response))
            }
        }
    }
}

async fn buffer(parts: response::Parts, body: Incoming) -> Result<BackendResponse> {
    let body = body
        .collect()
        .await
        .map_err(|e| classify_transport_error(&e, false))?
        .to_bytes();
    Ok(BackendResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}
