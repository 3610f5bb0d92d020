//! HTTP surface of the feed service.
//!
//! One conversion per request: the handler fetches the client's export,
//! converts it, and answers with the catalog or a plain-text error.

mod error;
mod handlers;

pub use error::AppError;
pub use handlers::{FeedParams, FEED_CONTENT_TYPE};

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::feed::SourceFetcher;

/// Shared, read-only request context.
#[derive(Debug, Clone)]
pub struct AppState {
    pub fetcher: SourceFetcher,
    pub default_domain: Arc<str>,
    pub cache_control: Arc<str>,
}

impl AppState {
    pub fn new(fetcher: SourceFetcher, config: &Config) -> Self {
        Self {
            fetcher,
            default_domain: Arc::from(config.default_domain.as_str()),
            cache_control: Arc::from(config.cache_control()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/feed", get(handlers::feed_by_query))
        .route("/feed/{hash}", get(handlers::feed_by_path))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serves the router on `listener` until Ctrl+C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
