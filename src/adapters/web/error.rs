//! HTTP error responses for the JSON API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::IndexpoolError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<IndexpoolError> for WebError {
    fn from(err: IndexpoolError) -> Self {
        let status = match &err {
            IndexpoolError::NotFound { .. } => StatusCode::NOT_FOUND,
            IndexpoolError::Validation { .. } | IndexpoolError::CsvImport { .. } => {
                StatusCode::BAD_REQUEST
            }
            IndexpoolError::ConfigParse { .. }
            | IndexpoolError::ConfigMissing { .. }
            | IndexpoolError::ConfigInvalid { .. }
            | IndexpoolError::Database { .. }
            | IndexpoolError::DatabaseQuery { .. }
            | IndexpoolError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
