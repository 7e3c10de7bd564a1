use std::{io, path::PathBuf};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failures raised by the catalog core.
///
/// Only `DatasetNotFound` (and plain I/O failures on the base tables) ever
/// reach a caller; `MalformedRow` and `ResolutionUnavailable` are recovered
/// locally and only show up in logs and load statistics.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("language data unavailable at {}: {source}", path.display())]
    ResolutionUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CatalogError {
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRow { line, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    err: anyhow::Error,
}

impl AppError {
    pub fn bad_request(msg: impl std::fmt::Display) -> Self {
        Self { status: StatusCode::BAD_REQUEST, err: anyhow::anyhow!("{msg}") }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, err }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, err: anyhow::Error::new(err) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self.err, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.err.to_string() }));
        (self.status, body).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
