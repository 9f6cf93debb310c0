//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the user-service proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Inbound listener (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Symbolic backend the proxy forwards to.
    pub backend: BackendConfig,

    /// Bearer token source for outbound calls.
    pub auth: AuthConfig,

    /// Outbound transport timeouts.
    pub transport: TransportConfig,

    /// Instance selection settings.
    pub load_balancer: LoadBalancerConfig,

    /// Known backend instances.
    pub discovery: DiscoveryConfig,

    /// Breaker guarding the get-user route.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Synthetic upload payload.
    pub upload: UploadConfig,

    /// Startup behaviour.
    pub startup: StartupConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for an inbound request, upload excluded.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// The backend service, addressed by its logical id.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Logical service id resolved through discovery.
    pub service_id: String,

    /// Path prefix of the backend API.
    pub base_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            service_id: "backend-service".to_string(),
            base_path: "/api/v1".to_string(),
        }
    }
}

/// Where the outbound bearer token comes from.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Literal token.
    pub token: Option<String>,

    /// Name of an environment variable holding the token. Takes precedence.
    pub token_env: Option<String>,
}

impl AuthConfig {
    /// Resolve the token, preferring the environment variable when set.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(var) = &self.token_env {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
            tracing::warn!(variable = %var, "Token environment variable not set");
        }
        self.token.clone()
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Complete-response timeout in milliseconds.
    pub response_timeout_ms: u64,

    /// Socket read inactivity timeout in milliseconds.
    pub read_timeout_ms: u64,

    /// Socket write inactivity timeout in milliseconds.
    pub write_timeout_ms: u64,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            response_timeout_ms: 5_000,
            read_timeout_ms: 5_000,
            write_timeout_ms: 5_000,
            pool_idle_timeout_secs: 30,
        }
    }
}

/// Load balancing strategy selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalancingStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// Instance selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Zone of this proxy; same-zone instances are preferred.
    pub zone: Option<String>,

    /// Strategy among the zone-filtered instances.
    pub strategy: BalancingStrategy,
}

/// Static registry contents.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub instances: Vec<InstanceConfig>,
}

/// One registered backend instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Unique instance id. Defaults to `host:port`.
    #[serde(default)]
    pub id: Option<String>,

    /// Logical service id this instance serves.
    pub service_id: String,

    pub host: String,

    pub port: u16,

    /// Zone label, stored as the `zone` metadata entry.
    #[serde(default)]
    pub zone: Option<String>,

    /// Free-form instance metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Breaker name used in logs and metrics.
    pub name: String,

    /// Failure rate in percent at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Slow call rate in percent at which the breaker opens.
    pub slow_call_rate_threshold: f64,

    /// Calls longer than this are slow, in milliseconds.
    pub slow_call_duration_ms: u64,

    /// Number of most recent outcomes evaluated.
    pub sliding_window_size: usize,

    /// Trial calls allowed while half-open.
    pub permitted_calls_in_half_open: usize,

    /// How long the breaker stays open, in milliseconds.
    pub wait_duration_in_open_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn slow_call_duration(&self) -> Duration {
        Duration::from_millis(self.slow_call_duration_ms)
    }

    pub fn wait_duration_in_open(&self) -> Duration {
        Duration::from_millis(self.wait_duration_in_open_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "backendService".to_string(),
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 50.0,
            slow_call_duration_ms: 2_000,
            sliding_window_size: 20,
            permitted_calls_in_half_open: 5,
            wait_duration_in_open_ms: 30_000,
        }
    }
}

/// Synthetic upload payload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Total bytes streamed to the backend.
    pub synthetic_size_bytes: u64,

    /// Size of each streamed chunk.
    pub chunk_size_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            synthetic_size_bytes: 10 * 1024 * 1024 * 1024,
            chunk_size_bytes: 64 * 1024,
        }
    }
}

/// Startup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Ping the backend once after the listener is bound.
    pub smoke_check: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self { smoke_check: true }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
