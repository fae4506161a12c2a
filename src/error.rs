#[cfg(feature = "rest-api")]
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use crate::service::ServiceError;
use crate::state::UnknownSection;
use crate::store::StoreError;
use crate::validation::{FieldViolation, ValidationError};

#[cfg(feature = "rest-api")]
use serde_json::json;

/// A specialized `Result` type for REST handlers (only when the rest-api feature is enabled).
#[cfg(feature = "rest-api")]
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type returned to HTTP clients.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationError),
    #[error("The request payload is invalid: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    UnknownSection(String),
    #[error("No route for {0}")]
    NotFound(String),
    #[error("{method} is not supported on {path}")]
    MethodNotAllowed { method: String, path: String },
    #[error("Device is restarting; retry in {} seconds", .retry_after.as_secs())]
    RestartPending { retry_after: Duration },
    #[error("Configuration could not be saved: {0}")]
    Storage(String),
    #[error("{0}")]
    RestartFailed(String),
}

impl AppError {
    /// Stable machine-readable name, used as `error.type` in responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::UnknownSection(_) => "UnknownSection",
            Self::NotFound(_) => "NotFound",
            Self::MethodNotAllowed { .. } => "MethodNotAllowed",
            Self::RestartPending { .. } => "RestartPending",
            Self::Storage(_) => "StorageError",
            Self::RestartFailed(_) => "RestartFailed",
        }
    }

    /// Rejected fields, for validation errors.
    pub fn fields(&self) -> &[FieldViolation] {
        match self {
            Self::Validation(e) => e.violations.as_slice(),
            _ => &[],
        }
    }
}

/// Allows Axum to convert `AppError` into an HTTP response (only when rest-api feature enabled).
#[cfg(feature = "rest-api")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSection(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RestartPending { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::RestartFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }

        let message = self.to_string();
        let mut error = json!({ "type": self.kind(), "message": message });
        if !self.fields().is_empty() {
            error["fields"] = json!(self.fields());
        }
        let body = axum::Json(json!({
            "status": "error",
            "message": message,
            "error": error,
        }));

        let mut response = (status, body).into_response();
        if let Self::RestartPending { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => Self::Validation(e),
            ServiceError::InvalidPayload(msg) => Self::InvalidPayload(msg),
            ServiceError::UnknownSection(e) => Self::UnknownSection(e.to_string()),
            ServiceError::RestartPending { retry_after } => Self::RestartPending { retry_after },
            ServiceError::Storage(e) => Self::Storage(e.to_string()),
            ServiceError::RestartFailed(msg) => Self::RestartFailed(msg),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<UnknownSection> for AppError {
    fn from(err: UnknownSection) -> Self {
        AppError::UnknownSection(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidPayload(err.to_string())
    }
}
