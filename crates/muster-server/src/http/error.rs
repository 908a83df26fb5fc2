//! Maps application errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use muster_app::error::AppError;
use muster_ports::error::PortError;

#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed or carried invalid data.
    BadRequest(String),

    NotFound(String),

    InternalServerError(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound => ApiError::NotFound("resource not found".to_string()),
            _ => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(e) => ApiError::BadRequest(e.to_string()),
            AppError::Port(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::InternalServerError(err) => {
                tracing::error!(%err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "an internal server error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
