//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! symbolic service id
//!     → discovery (live instances)
//!     → zone.rs (prefer same-zone instances, fall back to all)
//!     → Apply load balancing strategy:
//!         - round_robin.rs (rotate through instances)
//!         - random.rs (uniform pick)
//!     → client.rs (rewrite URI, hand to transport)
//! ```
//!
//! # Design Decisions
//! - Instances are resolved on every call, never cached here
//! - Strategy is a pluggable trait object selected from config

pub mod client;
pub mod random;
pub mod round_robin;
pub mod zone;

use crate::config::BalancingStrategy;
use crate::discovery::ServiceInstance;

pub use client::LoadBalancedClient;
pub use zone::ZonePreference;

/// Selection strategy among candidate instances.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one instance, or `None` when the list is empty.
    fn choose<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Build the configured strategy.
pub fn strategy_for(strategy: BalancingStrategy) -> Box<dyn LoadBalancer> {
    match strategy {
        BalancingStrategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        BalancingStrategy::Random => Box::new(random::Random),
    }
}
