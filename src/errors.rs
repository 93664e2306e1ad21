use thiserror::Error;

/// Internal error type for store, config, and crypto failures.
///
/// HTTP-facing errors live in `server::api_error`; this type is what the
/// database and config layers speak before a handler maps them outward.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("password hashing error: {0}")]
    Hash(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
