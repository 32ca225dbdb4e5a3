//! Redfish error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Errors a gateway endpoint can answer with
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed Basic credentials (401)
    #[error("{0}")]
    Authentication(String),

    /// Bad enum value or unsupported combination (400)
    #[error("{0}")]
    Validation(String),

    /// Required property absent (400)
    #[error("{0}")]
    PropertyMissing(String),

    /// No such route (404)
    #[error("{0}")]
    NotFound(String),

    /// Platform or connectivity failure (500)
    #[error("{0}")]
    General(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) | ApiError::PropertyMissing(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::General(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Redfish message registry id
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Authentication(_) => "Base.1.0.AuthenticationError",
            ApiError::PropertyMissing(_) => "Base.1.0.PropertyMissing",
            ApiError::Validation(_) | ApiError::NotFound(_) | ApiError::General(_) => {
                "Base.1.0.GeneralError"
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(envelope)).into_response()
    }
}

impl From<vmfish_common::Error> for ApiError {
    fn from(e: vmfish_common::Error) -> Self {
        ApiError::General(e.to_string())
    }
}
