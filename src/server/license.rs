//! `/check-license` and `/purchase` endpoints.
//!
//! `/check-license` is what the MT5 add-on polls from the trading terminal:
//! a bare `{mt5Account}` body, no session, answered with whether that
//! account number is currently licensed by anyone. A hit stamps the
//! account's `last_checked` timestamp.
//!
//! `/purchase` records intent only. Payment, provisioning, and the
//! confirmation email belong to an external pipeline.

use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::server::api_error::ApiError;
use crate::server::auth::AppState;
use crate::server::logging::{log_audit_event, AuditEvent};
use crate::server::validation::{validate_account_number, validate_email};

/// Request body for `/check-license`. No `action` field by design: the
/// add-on sends the account number and nothing else.
#[derive(Debug, Deserialize)]
pub struct CheckLicenseRequest {
    #[serde(default, rename = "mt5Account")]
    pub mt5_account: Option<String>,
}

/// Response body for `/check-license`.
#[derive(Debug, Serialize)]
pub struct CheckLicenseResponse {
    pub licensed: bool,
    pub account: String,
    pub timestamp: String,
    /// Owning user's email, present only on a hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Handler for `POST /check-license`.
pub async fn check_license_handler(
    State(state): State<AppState>,
    Json(payload): Json<CheckLicenseRequest>,
) -> Result<Json<CheckLicenseResponse>, ApiError> {
    let account = payload
        .mt5_account
        .ok_or_else(|| ApiError::missing_field("mt5Account"))?;
    validate_account_number(&account, "mt5Account")?;

    let owner = state.db.check_account(&account).await?;
    let licensed = owner.is_some();

    log_audit_event(
        AuditEvent::LicenseChecked,
        &account,
        Some(if licensed { "VALID" } else { "INVALID" }),
    );

    Ok(Json(CheckLicenseResponse {
        licensed,
        account,
        timestamp: rfc3339_now(),
        user: owner,
    }))
}

/// Request body for `/purchase`.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "mt5Account")]
    pub mt5_account: Option<String>,
}

/// Response body for `/purchase`.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub message: String,
}

/// Handler for `POST /purchase`.
///
/// Logs the intent and answers success; does not touch the account
/// registry or the license check.
pub async fn purchase_handler(
    State(_state): State<AppState>,
    Json(payload): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let email = payload
        .email
        .ok_or_else(|| ApiError::missing_field("email"))?;
    let account = payload
        .mt5_account
        .ok_or_else(|| ApiError::missing_field("mt5Account"))?;
    validate_email(&email, "email")?;
    validate_account_number(&account, "mt5Account")?;

    log_audit_event(AuditEvent::PurchaseRecorded, &email, Some(&account));

    Ok(Json(PurchaseResponse {
        success: true,
        message: "License purchased successfully".to_string(),
    }))
}

fn rfc3339_now() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = rfc3339_now();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn miss_omits_user_field() {
        let response = CheckLicenseResponse {
            licensed: false,
            account: "1001".to_string(),
            timestamp: rfc3339_now(),
            user: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("user"));
        assert!(json.contains("\"licensed\":false"));
    }
}
