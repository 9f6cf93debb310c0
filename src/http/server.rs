//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the outbound stack (transport, load-balanced client, breaker)
//! - Create Axum Router with the `/proxy` handlers
//! - Wire up middleware (tracing, request ID, request timeout)
//! - Serve on a bound listener until shutdown

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::interceptor::InterceptorPipeline;
use crate::client::{HttpUserServiceClient, Transport, UserServiceApi};
use crate::config::{ProxyConfig, UploadConfig};
use crate::discovery::ServiceDiscovery;
use crate::http::handlers;
use crate::load_balancer::{strategy_for, LoadBalancedClient, ZonePreference};
use crate::resilience::{CircuitBreaker, Timeouts};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserServiceApi>,
    pub breaker: Arc<CircuitBreaker>,
    pub upload: UploadConfig,
}

impl AppState {
    /// Wire the outbound stack described by `config` over `discovery`.
    pub fn from_config(config: &ProxyConfig, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        let timeouts = Timeouts::from(&config.transport);
        let pipeline = InterceptorPipeline::standard(config.auth.resolve_token());
        let transport = Transport::new(
            &config.backend.service_id,
            timeouts,
            pipeline,
            Duration::from_secs(config.transport.pool_idle_timeout_secs),
        );

        let client = LoadBalancedClient::new(
            config.backend.service_id.clone(),
            config.backend.base_path.clone(),
            discovery,
            ZonePreference::new(config.load_balancer.zone.clone()),
            strategy_for(config.load_balancer.strategy),
            transport,
        );

        Self {
            users: Arc::new(HttpUserServiceClient::new(client)),
            breaker: Arc::new(CircuitBreaker::new(config.circuit_breaker.clone())),
            upload: config.upload.clone(),
        }
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    pub fn new(config: ProxyConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The upload route is merged outside the request timeout.
    #[allow(deprecated)]
    pub fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let bounded = Router::new()
            .route("/proxy/create-new-user", post(handlers::create_user))
            .route("/proxy/user/{id}", get(handlers::get_user))
            .route("/proxy/user-with-data/{id}", get(handlers::get_user_with_data))
            .route("/proxy/proxy-http-status/{code}", get(handlers::proxy_http_status))
            .route("/proxy/ping", get(handlers::ping))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )));

        let streaming = Router::new().route("/proxy/upload", post(handlers::upload));

        bounded
            .merge(streaming)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.backend.service_id,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
