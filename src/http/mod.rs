//! Inbound HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, timeout)
//!     → handlers.rs (one handler per /proxy route)
//!     → client::api (backend call, breaker for get-user)
//!     → response.rs (backend status and body back to caller)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod upload;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
