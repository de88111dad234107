use crate::detect::DetectError;
use crate::tracking::TrackingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Tracking(TrackingError::InvalidCode(_)) => StatusCode::BAD_REQUEST,
            ApiError::Tracking(TrackingError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Tracking(TrackingError::Inactive(_)) => StatusCode::CONFLICT,
            ApiError::Tracking(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Detect(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({
            "data": null,
            "meta": { "error": self.to_string() }
        });
        (status, Json(body)).into_response()
    }
}
