//! Startup orchestration.
//!
//! # Responsibilities
//! - Ping the backend once after the listener is bound
//!
//! # Design Decisions
//! - Config errors are fatal before this point; the smoke check is not.
//!   A backend that is down at startup only produces a warning.

use crate::client::UserServiceApi;

/// Outcome of the startup ping, for the caller's logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeCheck {
    /// The backend answered; carries its `message`, if any.
    Passed(Option<String>),
    Failed(String),
}

/// Perform one load-balanced ping and log what came back.
pub async fn run_smoke_check(users: &dyn UserServiceApi) -> SmokeCheck {
    match users.ping().await {
        Ok(reply) => {
            let message = reply.get("message").cloned();
            match &message {
                Some(message) => tracing::info!(message = %message, "Backend smoke check passed"),
                None => tracing::warn!(keys = ?reply.keys().collect::<Vec<_>>(), "Backend ping carried no message"),
            }
            SmokeCheck::Passed(message)
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind().as_str(), "Backend smoke check failed, continuing");
            SmokeCheck::Failed(e.to_string())
        }
    }
}
