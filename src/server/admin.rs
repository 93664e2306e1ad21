//! `/admin` endpoint: full user and account report.
//!
//! Gated by a shared secret sourced from configuration
//! (`TRADELOCK_ADMIN_KEY`), compared in constant time. A wrong key answers
//! 401 no matter what else the payload contains.

use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use ring::constant_time::verify_slices_are_equal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::server::accounts::AccountView;
use crate::server::api_error::ApiError;
use crate::server::auth::AppState;
use crate::server::logging::{log_audit_event, AuditEvent};

/// Request body for `/admin`, discriminated by `action`.
#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "adminKey")]
    pub admin_key: Option<String>,
}

/// One user row in the admin report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub account_count: usize,
    pub accounts: Vec<AccountView>,
}

/// Response body for the `getAllUsers` report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReportResponse {
    pub success: bool,
    pub users: Vec<AdminUserView>,
    pub total_users: usize,
    pub total_accounts: usize,
}

/// Constant-time comparison of the presented key against the configured one.
fn admin_key_matches(presented: &str, configured: &str) -> bool {
    !configured.is_empty()
        && verify_slices_are_equal(presented.as_bytes(), configured.as_bytes()).is_ok()
}

/// Handler for `POST /admin`.
pub async fn admin_handler(
    State(state): State<AppState>,
    Json(payload): Json<AdminRequest>,
) -> Result<Json<AdminReportResponse>, ApiError> {
    let presented = payload.admin_key.as_deref().unwrap_or("");
    if !admin_key_matches(presented, &state.admin_key) {
        return Err(ApiError::unauthorized());
    }

    match payload.action.as_deref() {
        Some("getAllUsers") => get_all_users(&state).await,
        _ => Err(ApiError::invalid_action()),
    }
}

async fn get_all_users(state: &AppState) -> Result<Json<AdminReportResponse>, ApiError> {
    let users = state.db.list_users().await?;
    let all_accounts = state.db.list_all_accounts().await?;

    let mut accounts_by_user: HashMap<String, Vec<AccountView>> = HashMap::new();
    for account in all_accounts {
        accounts_by_user
            .entry(account.user_id.clone())
            .or_default()
            .push(AccountView::from(account));
    }

    let users: Vec<AdminUserView> = users
        .into_iter()
        .map(|user| {
            let accounts = accounts_by_user.remove(&user.id).unwrap_or_default();
            AdminUserView {
                account_count: accounts.len(),
                accounts,
                id: user.id,
                name: user.name,
                email: user.email,
                created_at: user.created_at,
            }
        })
        .collect();

    let total_users = users.len();
    let total_accounts = users.iter().map(|u| u.account_count).sum();

    log_audit_event(
        AuditEvent::AdminReport,
        "getAllUsers",
        Some(&format!("{total_users} users, {total_accounts} accounts")),
    );

    Ok(Json(AdminReportResponse {
        success: true,
        users,
        total_users,
        total_accounts,
    }))
}
