use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// A table does not have the shape a caller relies on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("column '{0}' is not present in the table schema")]
    MissingColumn(String),

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("row {row} does not match the table schema at column '{column}'")]
    RowMismatch { row: usize, column: String },
}

/// Failures surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("reloading the dataset failed: {0:#}")]
    Reload(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            // The UI and the data source disagree on columns; nothing the client can fix.
            ApiError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Reload(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::error!("request failed ({status}): {self}");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
