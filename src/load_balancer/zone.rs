//! Zone preference filter.
//!
//! Keeps the instances whose zone equals the caller's zone (ASCII
//! case-insensitive). Falls back to the unfiltered list when no zone is
//! configured or nothing matches.

use crate::discovery::ServiceInstance;

#[derive(Debug, Clone, Default)]
pub struct ZonePreference {
    zone: Option<String>,
}

impl ZonePreference {
    pub fn new(zone: Option<String>) -> Self {
        Self {
            zone: zone.filter(|z| !z.trim().is_empty()),
        }
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn filter(&self, instances: Vec<ServiceInstance>) -> Vec<ServiceInstance> {
        let Some(zone) = &self.zone else {
            return instances;
        };

        let same_zone: Vec<ServiceInstance> = instances
            .iter()
            .filter(|i| i.zone().is_some_and(|z| z.eq_ignore_ascii_case(zone)))
            .cloned()
            .collect();

        if same_zone.is_empty() {
            tracing::debug!(zone = %zone, candidates = instances.len(), "No same-zone instances, using all");
            instances
        } else {
            same_zone
        }
    }
}
