//! A registered backend instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::InstanceConfig;

/// Metadata key carrying the instance's zone label.
pub const ZONE_METADATA_KEY: &str = "zone";

/// One live address of a logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique instance id.
    pub instance_id: String,
    /// Logical service id.
    pub service_id: String,
    pub host: String,
    pub port: u16,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            instance_id: format!("{}:{}", host, port),
            service_id: service_id.into(),
            host,
            port,
            metadata: HashMap::new(),
        }
    }

    /// Set the zone label.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.metadata.insert(ZONE_METADATA_KEY.to_string(), zone.into());
        self
    }

    /// Zone label, if the instance carries one.
    pub fn zone(&self) -> Option<&str> {
        self.metadata.get(ZONE_METADATA_KEY).map(String::as_str)
    }

    /// `host:port`, suitable as a URI authority.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl From<&InstanceConfig> for ServiceInstance {
    fn from(config: &InstanceConfig) -> Self {
        let mut instance = ServiceInstance::new(&config.service_id, &config.host, config.port);
        if let Some(id) = &config.id {
            instance.instance_id = id.clone();
        }
        instance.metadata.extend(config.metadata.clone());
        if let Some(zone) = &config.zone {
            instance.metadata.insert(ZONE_METADATA_KEY.to_string(), zone.clone());
        }
        instance
    }
}
