//! Request validation utilities for the Tradelock API.

use std::fmt;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that a string is not empty or whitespace only.
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Validate string length is within bounds.
pub fn validate_length(
    value: &str,
    min: usize,
    max: usize,
    field_name: &str,
) -> ValidationResult<()> {
    let len = value.len();
    if len < min {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at least {} characters", min),
        })
    } else if len > max {
        Err(ValidationError {
            field: field_name.to_string(),
            message: format!("must be at most {} characters", max),
        })
    } else {
        Ok(())
    }
}

/// Validate an email address.
///
/// Intentionally loose: one `@`, something on both sides, a dot in the
/// domain. Deliverability is the mail provider's problem.
///
/// # Example
/// ```
/// use tradelock::server::validation::validate_email;
///
/// assert!(validate_email("alice@example.com", "email").is_ok());
/// assert!(validate_email("not-an-email", "email").is_err());
/// ```
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    let email_regex = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();

    if email_regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid email address".to_string(),
        })
    }
}

/// Validate an MT5 trading-account number.
///
/// MT5 logins are numeric, but broker exports sometimes carry an
/// alphanumeric suffix, so letters are allowed too: 1-32 alphanumeric
/// characters.
///
/// # Example
/// ```
/// use tradelock::server::validation::validate_account_number;
///
/// assert!(validate_account_number("1001", "accountNumber").is_ok());
/// assert!(validate_account_number("12345678A", "accountNumber").is_ok());
/// assert!(validate_account_number("10 01", "accountNumber").is_err());
/// ```
pub fn validate_account_number(value: &str, field_name: &str) -> ValidationResult<()> {
    let account_regex = regex::Regex::new(r"^[A-Za-z0-9]{1,32}$").unwrap();

    if account_regex.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError {
            field: field_name.to_string(),
            message: "invalid account number (1-32 alphanumeric characters)".to_string(),
        })
    }
}

/// Validate a registration password: at least 8 characters, at most 128.
pub fn validate_password(value: &str, field_name: &str) -> ValidationResult<()> {
    validate_length(value, 8, 128, field_name)
}
