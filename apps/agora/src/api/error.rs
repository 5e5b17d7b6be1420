//! # API Errors
//!
//! Maps `AgoraError` and extractor rejections to a status code plus the
//! `{success: false, kind, error}` envelope.

use super::types::ErrorResponse;
use agora_core::AgoraError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub AgoraError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_of(&self.0)
    }
}

/// HTTP status for an error class.
pub fn status_of(error: &AgoraError) -> StatusCode {
    match error {
        AgoraError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AgoraError::NotFound(_) => StatusCode::NOT_FOUND,
        AgoraError::Conflict(_) => StatusCode::CONFLICT,
        AgoraError::Forbidden(_) => StatusCode::FORBIDDEN,
        AgoraError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AgoraError> for ApiError {
    fn from(error: AgoraError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AgoraError::InvalidArgument(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(AgoraError::InvalidArgument(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AgoraError::InvalidArgument(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorResponse::from_error(&self.0))).into_response()
    }
}
