//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds within 0..=100)
//! - Check that registered instances are addressable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    if config.backend.service_id.trim().is_empty() {
        errors.push(ValidationError::new("backend.service_id", "must not be empty"));
    }
    if !config.backend.base_path.is_empty() && !config.backend.base_path.starts_with('/') {
        errors.push(ValidationError::new("backend.base_path", "must start with '/'"));
    }

    let transport = &config.transport;
    for (field, value) in [
        ("transport.connect_timeout_ms", transport.connect_timeout_ms),
        ("transport.response_timeout_ms", transport.response_timeout_ms),
        ("transport.read_timeout_ms", transport.read_timeout_ms),
        ("transport.write_timeout_ms", transport.write_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    let cb = &config.circuit_breaker;
    for (field, value) in [
        ("circuit_breaker.failure_rate_threshold", cb.failure_rate_threshold),
        ("circuit_breaker.slow_call_rate_threshold", cb.slow_call_rate_threshold),
    ] {
        if !(value > 0.0 && value <= 100.0) {
            errors.push(ValidationError::new(field, "must be within (0, 100]"));
        }
    }
    if cb.sliding_window_size == 0 {
        errors.push(ValidationError::new("circuit_breaker.sliding_window_size", "must be > 0"));
    }
    if cb.permitted_calls_in_half_open == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.permitted_calls_in_half_open",
            "must be > 0",
        ));
    }

    if config.upload.chunk_size_bytes == 0 {
        errors.push(ValidationError::new("upload.chunk_size_bytes", "must be > 0"));
    }

    for (i, instance) in config.discovery.instances.iter().enumerate() {
        if instance.host.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("discovery.instances[{}].host", i),
                "must not be empty",
            ));
        }
        if instance.port == 0 {
            errors.push(ValidationError::new(
                format!("discovery.instances[{}].port", i),
                "must be > 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
