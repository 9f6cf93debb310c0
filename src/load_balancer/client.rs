//! Load-balanced client bound to a symbolic service id.
//!
//! # Responsibilities
//! - Resolve the service id to live instances through discovery
//! - Apply zone preference, then the selection strategy
//! - Rewrite the request to `http://<instance><base_path><path>`
//! - Hand the request to the transport

use axum::http::Uri;
use std::sync::Arc;

use crate::client::transport::{BackendResponse, OutboundRequest, Transport};
use crate::discovery::{ServiceDiscovery, ServiceInstance};
use crate::error::{ProxyError, Result};
use crate::load_balancer::{zone::ZonePreference, LoadBalancer};

/// One logical client for one backend service.
pub struct LoadBalancedClient {
    service_id: String,
    base_path: String,
    discovery: Arc<dyn ServiceDiscovery>,
    zone: ZonePreference,
    strategy: Box<dyn LoadBalancer>,
    transport: Transport,
}

impl LoadBalancedClient {
    pub fn new(
        service_id: impl Into<String>,
        base_path: impl Into<String>,
        discovery: Arc<dyn ServiceDiscovery>,
        zone: ZonePreference,
        strategy: Box<dyn LoadBalancer>,
        transport: Transport,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            base_path: base_path.into().trim_end_matches('/').to_string(),
            discovery,
            zone,
            strategy,
            transport,
        }
    }

    /// Pick the instance for the next call.
    pub async fn choose(&self) -> Result<ServiceInstance> {
        let instances = self.discovery.instances(&self.service_id).await.map_err(|e| {
            tracing::warn!(service = %self.service_id, error = %e, "Discovery lookup failed");
            ProxyError::NoInstances(self.service_id.clone())
        })?;

        let candidates = self.zone.filter(instances);
        let chosen = self
            .strategy
            .choose(&candidates)
            .cloned()
            .ok_or_else(|| ProxyError::NoInstances(self.service_id.clone()))?;

        tracing::debug!(
            service = %self.service_id,
            instance = %chosen.instance_id,
            zone = ?chosen.zone(),
            candidates = candidates.len(),
            "Instance selected"
        );
        Ok(chosen)
    }

    /// Resolve an instance and perform the call.
    pub async fn execute(&self, request: OutboundRequest) -> Result<BackendResponse> {
        let instance = self.choose().await?;
        let uri = self.target_uri(&instance, &request.path)?;
        self.transport.send(uri, request).await
    }

    fn target_uri(&self, instance: &ServiceInstance, path: &str) -> Result<Uri> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("http://{}{}{}", instance.authority(), self.base_path, path)
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))
    }
}
