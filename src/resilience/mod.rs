//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → circuit_breaker.rs (guarded routes only; fail fast when open)
//!     → timeouts.rs (connect/response/read/write deadlines, failure classification)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed call surfaces to the caller once
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitState, Outcome};
pub use timeouts::{TimeoutLeg, Timeouts};
