//! Typed stub for the user service API.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::client::dto::{BackendReply, UserDbDto, UserDto};
use crate::client::transport::{BackendResponse, OutboundRequest};
use crate::error::{ProxyError, Result};
use crate::load_balancer::LoadBalancedClient;

/// Header selecting the backend API version.
pub const X_API_VERSION: HeaderName = HeaderName::from_static("x-api-version");

/// Headers that never cross the proxy.
const EXCLUDED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Remote operations of the user service.
#[async_trait]
pub trait UserServiceApi: Send + Sync {
    async fn create(&self, user: &UserDbDto) -> Result<BackendReply<UserDbDto>>;

    async fn get_by_id(&self, id: i64, api_version: Option<&str>) -> Result<BackendReply<UserDto>>;

    /// Fetch the user, forwarding the caller's end-to-end headers.
    async fn get_with_data(&self, id: i64, headers: &HeaderMap) -> Result<BackendReply<UserDbDto>>;

    /// Ask the backend to answer with `code`; the body is returned as text.
    async fn http_status(&self, code: u16) -> Result<BackendReply<String>>;

    async fn ping(&self) -> Result<HashMap<String, String>>;

    /// Stream `body` to the upload endpoint; `sent` fires once it is exhausted.
    async fn upload(&self, body: Body, sent: oneshot::Receiver<()>) -> Result<StatusCode>;
}

/// `UserServiceApi` over a load-balanced HTTP client.
pub struct HttpUserServiceClient {
    client: LoadBalancedClient,
}

impl HttpUserServiceClient {
    pub fn new(client: LoadBalancedClient) -> Self {
        Self { client }
    }
}

/// Drop hop-by-hop and framing headers, plus anything named in `Connection`.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lower = name.as_str();
        if EXCLUDED_HEADERS.contains(&lower) || listed.iter().any(|l| l == lower) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn decode<T: DeserializeOwned>(response: BackendResponse) -> Result<BackendReply<T>> {
    let body = if response.body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&response.body)?)
    };
    Ok(BackendReply::new(response.status, body))
}

#[async_trait]
impl UserServiceApi for HttpUserServiceClient {
    async fn create(&self, user: &UserDbDto) -> Result<BackendReply<UserDbDto>> {
        let request = OutboundRequest::post("/create-new-user").json(user)?;
        decode(self.client.execute(request).await?)
    }

    async fn get_by_id(&self, id: i64, api_version: Option<&str>) -> Result<BackendReply<UserDto>> {
        let mut request = OutboundRequest::get(format!("/user/{}", id));
        if let Some(version) = api_version {
            let value = HeaderValue::from_str(version)
                .map_err(|e| ProxyError::InvalidRequest(format!("X-API-Version: {}", e)))?;
            request = request.header(X_API_VERSION, value);
        }
        decode(self.client.execute(request).await?)
    }

    async fn get_with_data(&self, id: i64, headers: &HeaderMap) -> Result<BackendReply<UserDbDto>> {
        let request = OutboundRequest::get(format!("/user-with-data/{}", id))
            .headers(end_to_end_headers(headers));
        decode(self.client.execute(request).await?)
    }

    async fn http_status(&self, code: u16) -> Result<BackendReply<String>> {
        let response = self
            .client
            .execute(OutboundRequest::get(format!("/http-status/{}", code)))
            .await?;
        let body = (!response.body.is_empty())
            .then(|| String::from_utf8_lossy(&response.body).into_owned());
        Ok(BackendReply::new(response.status, body))
    }

    async fn ping(&self) -> Result<HashMap<String, String>> {
        let response = self.client.execute(OutboundRequest::get("/ping")).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn upload(&self, body: Body, sent: oneshot::Receiver<()>) -> Result<StatusCode> {
        let request = OutboundRequest::post("/upload")
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            )
            .streaming(body, sent);
        let response = self.client.execute(request).await?;
        Ok(response.status)
    }
}
