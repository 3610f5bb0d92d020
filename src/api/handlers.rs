use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{AppError, AppState};
use crate::feed::convert;

/// Content type of a generated catalog.
pub const FEED_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Query parameters accepted by the feed routes.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    /// Client hash identifying the listing export
    pub hash: Option<String>,
    /// Site used for canonical item links
    pub domain: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `GET /feed?hash=..&domain=..`
pub async fn feed_by_query(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Response, AppError> {
    let hash = non_blank(params.hash).ok_or(AppError::MissingHash)?;
    generate_feed(&state, &hash, non_blank(params.domain)).await
}

/// `GET /feed/{hash}?domain=..`
///
/// A `hash` query parameter, when present, wins over the path.
pub async fn feed_by_path(
    State(state): State<AppState>,
    Path(path_hash): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Response, AppError> {
    let hash = non_blank(params.hash)
        .or_else(|| non_blank(Some(path_hash)))
        .ok_or(AppError::MissingHash)?;
    generate_feed(&state, &hash, non_blank(params.domain)).await
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// Fetches the export for `hash` and converts it into a catalog response.
async fn generate_feed(
    state: &AppState,
    hash: &str,
    domain: Option<String>,
) -> Result<Response, AppError> {
    let domain = domain.unwrap_or_else(|| state.default_domain.to_string());

    let bytes = state.fetcher.fetch(hash).await?;
    let fetched_bytes = bytes.len();

    // Parsing a large export is CPU-bound; keep it off the async workers
    let conversion = {
        let domain = domain.clone();
        tokio::task::spawn_blocking(move || convert(&bytes, &domain))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??
    };

    tracing::info!(
        hash = %hash,
        domain = %domain,
        bytes = fetched_bytes,
        records = conversion.records,
        items = conversion.items,
        skipped = conversion.skipped,
        failed = conversion.failed,
        "Generated feed"
    );

    Ok((
        [
            (header::CONTENT_TYPE, FEED_CONTENT_TYPE),
            (header::CACHE_CONTROL, &*state.cache_control),
        ],
        conversion.document,
    )
        .into_response())
}
