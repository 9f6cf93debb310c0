//! Outbound client for the user service.
//!
//! # Data Flow
//! ```text
//! api.rs (typed stub)
//!     → load_balancer::client (instance resolution)
//!     → transport.rs (interceptors, response deadline)
//!     → io.rs (connect deadline, read/write inactivity)
//! ```

pub mod api;
pub mod dto;
pub mod interceptor;
pub mod io;
pub mod transport;

pub use api::{HttpUserServiceClient, UserServiceApi};
pub use dto::{BackendReply, UserDbDto, UserDto};
pub use transport::{BackendResponse, OutboundRequest, Transport};
