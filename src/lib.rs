//! User-service proxy library.
//!
//! A thin HTTP reverse proxy in front of a discovered backend "user service":
//! load-balanced outbound calls with timeouts, correlation id and bearer
//! token injection, typed translation of backend error statuses, and a
//! circuit breaker on the get-user route.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, Result};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
