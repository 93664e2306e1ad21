//! `/auth` endpoint: registration, login, session validation.
//!
//! A single POST route discriminated by the `action` field in the body,
//! matching what the add-on's web client sends:
//!
//! - `register` - create a user; duplicate email answers 200 `success:false`
//! - `login` - verify credentials, mint an opaque session token
//! - `validate` - resolve a session token back to its user
//!
//! Bad credentials and unknown tokens answer 401. The response never says
//! whether an email is registered, and the password hash never leaves the
//! server.

use std::sync::Arc;

use axum::{extract::State, Json};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::password;
use crate::server::api_error::ApiError;
use crate::server::database::{Database, User};
use crate::server::logging::{log_audit_event, AuditEvent};
use crate::server::validation::{
    validate_email, validate_length, validate_not_empty, validate_password,
};

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    /// Shared secret for `/admin`, sourced from configuration.
    pub admin_key: String,
}

/// Request body for `/auth`, discriminated by `action`.
///
/// Fields other than `action` are optional at the wire level; each action
/// checks for the ones it needs and answers 400 when they are missing.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Public user fields. The password hash is deliberately absent.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Response body for `/auth` actions.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

impl AuthResponse {
    fn message(success: bool, message: &str) -> Self {
        Self {
            success,
            message: Some(message.to_string()),
            token: None,
            user: None,
        }
    }
}

/// Pull a required field out of an optional slot.
fn require_field(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value.ok_or_else(|| ApiError::missing_field(field))
}

/// Mint a cryptographically random opaque session token (64 hex chars).
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Handler for `POST /auth`.
pub async fn auth_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    match payload.action.as_deref() {
        Some("register") => register(&state, payload).await,
        Some("login") => login(&state, payload).await,
        Some("validate") => validate(&state, payload).await,
        _ => Err(ApiError::invalid_action()),
    }
}

async fn register(state: &AppState, payload: AuthRequest) -> Result<Json<AuthResponse>, ApiError> {
    let name = require_field(payload.name, "name")?;
    let email = require_field(payload.email, "email")?;
    let password = require_field(payload.password, "password")?;

    validate_not_empty(&name, "name")?;
    validate_length(&name, 1, 100, "name")?;
    validate_email(&email, "email")?;
    validate_password(&password, "password")?;

    let hash = password::hash_password(&password)?;

    match state.db.create_user(&name, &email, &hash).await? {
        Some(user) => {
            log_audit_event(AuditEvent::UserRegistered, &user.email, None);
            Ok(Json(AuthResponse::message(
                true,
                "User created successfully",
            )))
        }
        None => Ok(Json(AuthResponse::message(false, "User already exists"))),
    }
}

async fn login(state: &AppState, payload: AuthRequest) -> Result<Json<AuthResponse>, ApiError> {
    let email = require_field(payload.email, "email")?;
    let password = require_field(payload.password, "password")?;

    let user_opt = state.db.get_user_by_email(&email).await?;

    // Verify against a dummy hash when the email is unknown, so both
    // failure paths burn the same time and the reply stays identical.
    let stored_hash = user_opt
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .unwrap_or(password::DUMMY_HASH);
    let password_valid = password::verify_password(&password, stored_hash);

    let user = match user_opt {
        Some(user) if password_valid => user,
        _ => {
            log_audit_event(AuditEvent::LoginFailed, &email, Some("bad credentials"));
            return Err(ApiError::invalid_credentials());
        }
    };

    let token = generate_session_token();
    state.db.create_session(&token, &user).await?;
    log_audit_event(AuditEvent::LoginSucceeded, &user.email, None);

    Ok(Json(AuthResponse {
        success: true,
        message: None,
        token: Some(token),
        user: Some(PublicUser::from(&user)),
    }))
}

async fn validate(state: &AppState, payload: AuthRequest) -> Result<Json<AuthResponse>, ApiError> {
    let token = require_field(payload.token, "token")?;

    let session = state
        .db
        .get_session(&token)
        .await?
        .ok_or_else(ApiError::invalid_session)?;

    let user = state
        .db
        .get_user_by_id(&session.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    log_audit_event(AuditEvent::SessionValidated, &user.email, None);

    Ok(Json(AuthResponse {
        success: true,
        message: None,
        token: None,
        user: Some(PublicUser::from(&user)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_64_hex_chars() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_tokens_are_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn public_user_omits_hash() {
        let user = User {
            id: "u-1".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(&user)).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("alice@example.com"));
    }
}
