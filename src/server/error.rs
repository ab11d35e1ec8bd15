//! Error responses for the HTTP front-end

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::ClassifyError;

/// Any per-request failure; always rendered as `500 {"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub ClassifyError);

impl From<ClassifyError> for ApiError {
    fn from(e: ClassifyError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.0.is_user_error() {
            tracing::warn!(detail = %self.0, "Rejected request");
            self.0.to_string()
        } else {
            tracing::error!(detail = %self.0, "Internal error while classifying");
            "An internal error occurred while analysing the image".to_string()
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
