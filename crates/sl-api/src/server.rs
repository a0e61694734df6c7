//! API server implementation.

use axum::{middleware, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ApiError;
use crate::middleware::observe;
use crate::routes;
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ApiServerConfig {
    /// Reads the bind address from `BIND_ADDRESS` when set.
    pub fn from_env() -> Self {
        let bind_address = std::env::var("BIND_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| Self::default().bind_address);
        Self { bind_address }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a new API server with default configuration.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();

        routes::create_router(self.state.clone())
            .fallback(not_found)
            // Apply middleware (order matters: innermost first)
            .layer(middleware::from_fn_with_state(self.state.clone(), observe))
            .layer(TraceLayer::new_for_http())
            // Catch panics and return 500
            .layer(CatchPanicLayer::new())
    }

    /// Runs the server until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let app = self.router();
        let addr = self.config.bind_address;

        info!("Starting API server on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server shut down gracefully");
        Ok(())
    }
}

async fn not_found(request: axum::extract::Request) -> ApiError {
    ApiError::NotFound(request.uri().path().to_string())
}

/// Default shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use sl_core::LogConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_builds_and_serves_health() {
        let state = AppState::new(LogConfig::development());
        let server = ApiServer::with_state(state);
        let router = server.router();

        let response = router
            .oneshot(
                axum::http::Request::get("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key(crate::middleware::REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_unknown_route_returns_not_found() {
        let state = AppState::new(LogConfig::development());
        let router = ApiServer::with_state(state).router();

        let response = router
            .oneshot(
                axum::http::Request::get("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
