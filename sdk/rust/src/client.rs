use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error body the proxy returns for translated failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
    pub message: String,
}

/// Client for the proxy's `/proxy` routes.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    proxy_url: String,
}

impl ProxyClient {
    pub fn new(proxy_url: &str) -> Self {
        Self {
            client: Client::new(),
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/proxy{}", self.proxy_url, path)
    }

    pub async fn create_user<T: Serialize + ?Sized>(&self, user: &T) -> Result<Response, reqwest::Error> {
        self.client.post(self.url("/create-new-user")).json(user).send().await
    }

    /// `GET /proxy/user/{id}`, optionally pinning the backend API version.
    pub async fn get_user(&self, id: i64, api_version: Option<&str>) -> Result<Response, reqwest::Error> {
        let mut request = self.client.get(self.url(&format!("/user/{}", id)));
        if let Some(version) = api_version {
            request = request.header("X-API-Version", version);
        }
        request.send().await
    }

    /// `GET /proxy/user-with-data/{id}` with extra headers to forward.
    pub async fn get_user_with_data(
        &self,
        id: i64,
        headers: &[(&str, &str)],
    ) -> Result<Response, reqwest::Error> {
        let mut request = self.client.get(self.url(&format!("/user-with-data/{}", id)));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await
    }

    pub async fn http_status(&self, code: u16) -> Result<Response, reqwest::Error> {
        self.client
            .get(self.url(&format!("/proxy-http-status/{}", code)))
            .send()
            .await
    }

    /// Ping through the proxy; fails on any non-success status.
    pub async fn ping(&self) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
        let resp = self.client.get(self.url("/ping")).send().await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Proxy returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn upload(&self) -> Result<Response, reqwest::Error> {
        self.client.post(self.url("/upload")).send().await
    }
}

/// Decode a translated failure from a proxy response.
pub async fn error_body(resp: Response) -> Result<ErrorBody, reqwest::Error> {
    resp.json().await
}
