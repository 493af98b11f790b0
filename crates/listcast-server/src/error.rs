//! The single error boundary between handlers and HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listcast_core::{Categorizable, ListcastError, SafeErrorCategory};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Command(#[from] ListcastError),

    #[error("fan-out handoff failed: {0}")]
    Handoff(anyhow::Error),
}

impl Categorizable for ApiError {
    fn category(&self) -> SafeErrorCategory {
        match self {
            ApiError::Command(err) => err.category(),
            ApiError::Handoff(_) => SafeErrorCategory::Upstream,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.category();
        error!(error = %self, detail = ?self, ?category, "request failed");

        let status =
            StatusCode::from_u16(category.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, category.safe_message()).into_response()
    }
}
