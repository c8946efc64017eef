//! Relay HTTP Server
//!
//! HTTP layer for the relay, built with Axum.
//!
//! # Endpoints
//!
//! ## WebSocket
//! - `GET /ws` - Live telemetry stream
//! - `GET /` - Same stream for upgrade requests; dashboard page otherwise
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe (broker subscription active)
//! - `GET /health` - Full health status
//!
//! ## Static files
//! - Any other path is served from `server.static_dir` when configured
//!
//! # Example
//!
//! ```rust,ignore
//! use posture_relay::api::{serve, AppState};
//! use posture_relay::config::Config;
//! use posture_relay::upstream::{MqttBroker, UpstreamSubscriber};
//! use posture_relay::websocket::{BroadcastRelay, ClientRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let registry = Arc::new(ClientRegistry::new());
//!     let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry)));
//!
//!     let subscriber = UpstreamSubscriber::new(
//!         MqttBroker::new(&config.broker),
//!         config.topic()?,
//!         config.reconnect.clone(),
//!         relay,
//!     );
//!     let state = AppState::new(registry, subscriber.link_state(), config.topic()?);
//!     subscriber.spawn();
//!
//!     serve(state, &config.server).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ServerError, ServerResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::websocket::{root_handler, websocket_handler};

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let static_dir = state.static_dir.clone();

    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/ws", get(websocket_handler))
        .nest("/health", health_routes);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    // Create shared state
    let shared_state = Arc::new(state);

    router
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Bind the listen address.
///
/// Failure here is the one fatal error of the relay.
pub async fn bind(config: &ServerConfig) -> ServerResult<TcpListener> {
    let addr = config.addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Start the relay server
pub async fn serve(state: AppState, config: &ServerConfig) -> ServerResult<()> {
    let listener = bind(config).await?;
    serve_on(listener, state).await
}

/// Run the server on an already bound listener until a shutdown signal
pub async fn serve_on(listener: TcpListener, state: AppState) -> ServerResult<()> {
    let router = build_router(state);

    tracing::info!("Posture relay listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Posture relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
