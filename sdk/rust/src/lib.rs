//! Client for the user-service proxy.

pub mod client;

pub use client::{error_body, ErrorBody, ProxyClient};
