//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! symbolic service id ("backend-service")
//!     → ServiceDiscovery::instances (registry lookup)
//!     → Vec<ServiceInstance> (host, port, zone metadata)
//!     → load_balancer (zone preference + strategy)
//! ```
//!
//! The registry itself is an external collaborator. `StaticDiscovery` serves
//! the instance list from configuration and is swapped on config reload.

pub mod instance;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::InstanceConfig;
pub use instance::{ServiceInstance, ZONE_METADATA_KEY};

/// Service discovery errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),
}

/// Lookup of live instances by logical service id.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// All registered instances of `service_id`. Never returns an empty list.
    async fn instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>, DiscoveryError>;
}

/// Config-backed registry.
#[derive(Debug)]
pub struct StaticDiscovery {
    instances: ArcSwap<Vec<ServiceInstance>>,
}

impl StaticDiscovery {
    pub fn new(configs: &[InstanceConfig]) -> Self {
        Self {
            instances: ArcSwap::from_pointee(configs.iter().map(ServiceInstance::from).collect()),
        }
    }

    /// Build directly from instances.
    pub fn from_instances(instances: Vec<ServiceInstance>) -> Self {
        Self {
            instances: ArcSwap::from_pointee(instances),
        }
    }

    /// Atomically replace the registered instances.
    pub fn replace(&self, configs: &[InstanceConfig]) {
        self.instances
            .store(Arc::new(configs.iter().map(ServiceInstance::from).collect()));
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let snapshot = self.instances.load();
        let matching: Vec<ServiceInstance> = snapshot
            .iter()
            .filter(|i| i.service_id.eq_ignore_ascii_case(service_id))
            .cloned()
            .collect();

        if matching.is_empty() {
            Err(DiscoveryError::ServiceNotFound(service_id.to_string()))
        } else {
            Ok(matching)
        }
    }
}
