use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the portal core and its HTTP handlers.
///
/// Every variant is local to the operation that raised it: nothing here is
/// fatal to the running server, and the caller is free to retry.
#[derive(Error, Debug)]
pub enum PortalError {
    /// Record store call rejected or returned a body we could not decode
    #[error("Record store query failed: {0}")]
    Query(String),

    /// Blob store rejected an upload
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload endpoint hit while the admission gate is closed
    #[error("Admission required: {0}")]
    NotAdmitted(String),

    /// Admission state could not be read from or written to local storage
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Convenience Result type for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    pub fn query(message: impl Into<String>) -> Self {
        PortalError::Query(message.into())
    }

    pub fn upload(message: impl Into<String>) -> Self {
        PortalError::Upload(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PortalError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Query(_) | PortalError::Upload(_) => StatusCode::BAD_GATEWAY,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::NotAdmitted(_) => StatusCode::FORBIDDEN,
            PortalError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for PortalError {
    fn from(err: validator::ValidationErrors) -> Self {
        PortalError::Validation(err.to_string())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match status {
            StatusCode::BAD_GATEWAY | StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(status = status.as_u16(), "{}", self)
            }
            _ => tracing::warn!(status = status.as_u16(), "{}", self),
        }

        let body = json!({
            "message": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
