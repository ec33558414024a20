use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::models::ErrorResponse;
use crate::error::InferenceError;

/// Handler failures, rendered as JSON bodies.
#[derive(Error, Debug)]
pub enum ApiError {
    /// 400, `{"error": ...}`
    #[error("{0}")]
    BadRequest(String),

    /// 500, `{"error": ..., "status": "error"}`
    #[error("{0}")]
    Internal(String),
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::EmptyInput => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(format!("Error generating response: {}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, body) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorResponse { error, status: None }),
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error,
                    status: Some("error".to_string()),
                },
            ),
        };
        (status_code, Json(body)).into_response()
    }
}
