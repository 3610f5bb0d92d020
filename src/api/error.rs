use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::feed::{FeedError, FetchError, SourceError};

/// Request-level failures, rendered as plain-text responses.
///
/// Messages are shown to the agency's marketing staff, so they stay in Portuguese.
#[derive(Debug, Error)]
pub enum AppError {
    /// `hash` parameter absent or blank
    #[error("Hash do cliente obrigatorio.")]
    MissingHash,

    /// `hash` cannot be used as a path segment
    #[error("Hash do cliente invalido.")]
    InvalidHash,

    /// Upstream answered with a non-200 status
    #[error("Erro na origem: {0}")]
    Upstream(u16),

    /// Upstream payload is not parsable XML
    #[error("XML da origem invalido ou corrompido.")]
    InvalidDocument(#[source] SourceError),

    /// Anything else: network failure, timeout, oversized body, render failure
    #[error("Erro interno no servidor: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingHash | AppError::InvalidHash => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) | AppError::InvalidDocument(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::UpstreamStatus(status) => AppError::Upstream(status),
            FetchError::InvalidHash(_) => AppError::InvalidHash,
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<FeedError> for AppError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::InvalidDocument(source) => AppError::InvalidDocument(source),
            FeedError::Render(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::MissingHash | AppError::InvalidHash => {
                tracing::debug!(error = %self, "Rejected feed request");
            }
            AppError::Upstream(upstream) => {
                tracing::warn!(upstream_status = *upstream, "Upstream error");
            }
            AppError::InvalidDocument(e) => {
                tracing::warn!(error = %e, "Upstream returned an invalid document");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
