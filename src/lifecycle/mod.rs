//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Bind listener → Smoke check → Serve
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast → server drains, reload loop exits
//! ```

pub mod shutdown;
pub mod startup;

pub use shutdown::{wait_for_signal, Shutdown};
pub use startup::{run_smoke_check, SmokeCheck};
