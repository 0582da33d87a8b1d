//! Gateway service: validates configuration, builds the router and serves
//! it until a shutdown signal resolves.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::rest::AppState;
use crate::router::build_router;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub struct ApiGatewayService {
    config: GatewayConfig,
    router: Router,
}

impl ApiGatewayService {
    pub fn new(config: GatewayConfig, state: AppState) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        let router = build_router(state, &config);
        Ok(Self { config, router })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(
            addr = ?addr,
            pubsub_path = %self.config.auth.pubsub_path,
            rest_auth = self.config.auth.jwt_secret.is_some(),
            "Starting API gateway"
        );
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("API gateway stopped");
        Ok(())
    }
}
