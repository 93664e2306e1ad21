//! Standardized API error responses for all Tradelock endpoints.
//!
//! Error taxonomy and status mapping:
//!
//! - validation problems (missing/malformed fields, unknown action) -> 400
//! - auth problems (bad credentials, invalid session, bad admin key) -> 401
//! - unknown user/account -> 404
//! - store/config/unexpected failures -> 500 with a generic message
//!
//! Business-rule refusals (cap reached, duplicate account, email taken) are
//! not errors at this layer: handlers answer them with HTTP 200 and
//! `success: false` in the body, the convention the add-on client expects.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "success": false,
//!   "error": "Invalid session"
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::server::validation::ValidationError;

/// Machine-readable error categories, mapped to HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // === Validation (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// A field value is invalid
    InvalidField,
    /// The `action` discriminator is unknown
    InvalidAction,

    // === Authentication (401) ===
    /// Email/password pair did not match
    InvalidCredentials,
    /// Session token is unknown
    InvalidSession,
    /// Admin shared secret did not match
    Unauthorized,

    // === Resources (404) ===
    /// Requested user/account was not found
    NotFound,

    // === Server (500) ===
    /// Database operation failed
    DatabaseError,
    /// Server configuration error
    ConfigError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::MissingField
            | ErrorCode::InvalidField
            | ErrorCode::InvalidAction => StatusCode::BAD_REQUEST,

            ErrorCode::InvalidCredentials | ErrorCode::InvalidSession | ErrorCode::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::InvalidAction => "Invalid action",
            ErrorCode::InvalidCredentials => "Invalid credentials",
            ErrorCode::InvalidSession => "Invalid session",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::DatabaseError => "Server error",
            ErrorCode::ConfigError => "Server error",
            ErrorCode::InternalError => "Server error",
        }
    }
}

/// An HTTP-mappable API error.
///
/// Serializes to `{"success": false, "error": "<message>"}`; the status
/// code comes from the `ErrorCode`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl ApiError {
    /// Creates a new API error with the default message for the code.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
        }
    }

    /// Creates a new API error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    // === Convenience constructors ===

    pub fn invalid_action() -> Self {
        Self::new(ErrorCode::InvalidAction)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials)
    }

    pub fn invalid_session() -> Self {
        Self::new(ErrorCode::InvalidSession)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::with_message(
            ErrorCode::MissingField,
            format!("Required field '{field}' is missing"),
        )
    }

    pub fn not_found(resource: &str) -> Self {
        Self::with_message(ErrorCode::NotFound, format!("{resource} not found"))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: self.message,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// === Conversions from internal error types ===

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        // Internal detail has been logged at the failure site; the caller
        // gets the generic message only.
        let code = match err {
            ServiceError::Database(_) => ErrorCode::DatabaseError,
            ServiceError::Config(_) => ErrorCode::ConfigError,
            ServiceError::Hash(_) => ErrorCode::InternalError,
        };
        ApiError::new(code)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::with_message(ErrorCode::InvalidField, err.to_string())
    }
}
