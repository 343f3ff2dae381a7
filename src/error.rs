use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Main application error type. Messages are deliberately uniform: the reason a
/// credential was rejected only appears in server logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Sign-in failed")]
    SignInFailed,

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure - simplified to just message + status code
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::SignInFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to simplified error response. Internal details stay out of the body.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse { message }
    }
}

/// Implement IntoResponse for automatic conversion in handlers
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status.as_u16(), "Request rejected");
        }

        let error_response = self.to_response();

        (status, Json(error_response)).into_response()
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
