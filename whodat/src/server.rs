//! Router construction and the serve loop.

use axum::{
    routing::{any, get},
    Router,
};
use libwhodat::MultiWhois;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, multi_handler, not_found_handler};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<dyn MultiWhois>,
    /// Deadline for one request's whole batch of lookups.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(resolver: Arc<dyn MultiWhois>, request_timeout: Duration) -> Self {
        Self {
            resolver,
            request_timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/multi", any(multi_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "HTTP server starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
