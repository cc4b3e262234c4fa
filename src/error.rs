use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::tracking::{FaultKind, HandlerFault};

/// Unified error type for the tracking service
#[derive(Error, Debug)]
pub enum TrackingError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request log not found: {id}")]
    RequestLogNotFound { id: i64 },

    // Client input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed request body: {0}")]
    ParseError(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Authentication errors
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Handler faults
    #[error("API error: {0}")]
    Api(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

impl TrackingError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            TrackingError::Validation(_)
            | TrackingError::ParseError(_)
            | TrackingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            TrackingError::AuthenticationFailed
            | TrackingError::InvalidCredentials
            | TrackingError::JwtError(_) => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            TrackingError::RequestLogNotFound { .. } | TrackingError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }

            // 415 Unsupported Media Type
            TrackingError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 503 Service Unavailable
            TrackingError::DatabaseConnection(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            TrackingError::Database(_)
            | TrackingError::InvalidConfig(_)
            | TrackingError::Io(_)
            | TrackingError::Api(_)
            | TrackingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Describe this error as a fault for the tracking middleware
    pub fn to_fault(&self) -> HandlerFault {
        let kind = if self.is_server_error() {
            FaultKind::Server
        } else {
            FaultKind::Client
        };

        HandlerFault::new(kind, format!("{:?}", self))
    }
}

// Implement IntoResponse for API error responses
impl IntoResponse for TrackingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let fault = self.to_fault();
        let body = json!({
            "error": self.to_string(),
        });

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(fault);
        response
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for TrackingError {
    fn from(err: url::ParseError) -> Self {
        TrackingError::InvalidConfig(err.to_string())
    }
}
