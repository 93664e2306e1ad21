//! `/accounts` endpoint: per-user trading-account allowlisting.
//!
//! Every action requires a valid session token. The allowlist is capped at
//! `MAX_ACCOUNTS_PER_USER` entries; cap and duplicate refusals answer 200
//! with `success: false`, the convention the web client expects, while a
//! remove of an absent number answers 404.
//!
//! Both action spellings from the web client's history are accepted:
//! `list`/`getAccounts`, `add`/`addAccount`, `remove`/`removeAccount`.

use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::server::api_error::ApiError;
use crate::server::auth::AppState;
use crate::server::database::{AddAccountOutcome, LicensedAccount, User};
use crate::server::logging::{log_audit_event, AuditEvent};
use crate::server::validation::validate_account_number;

/// Request body for `/accounts`, discriminated by `action`.
#[derive(Debug, Deserialize)]
pub struct AccountsRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "accountNumber")]
    pub account_number: Option<String>,
}

/// Wire representation of a licensed account.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub account_number: String,
    pub status: String,
    pub date_added: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<NaiveDateTime>,
}

impl From<LicensedAccount> for AccountView {
    fn from(account: LicensedAccount) -> Self {
        Self {
            account_number: account.account_number,
            status: account.status,
            date_added: account.added_at,
            last_checked: account.last_checked,
        }
    }
}

/// Response body for `/accounts` actions.
#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<AccountView>>,
}

impl AccountsResponse {
    fn message(success: bool, message: &str) -> Self {
        Self {
            success,
            message: Some(message.to_string()),
            accounts: None,
        }
    }
}

/// Resolve the session token to its owning user, or fail with 401/404.
async fn resolve_user(state: &AppState, token: Option<String>) -> Result<User, ApiError> {
    let token = token.ok_or_else(|| ApiError::missing_field("token"))?;

    let session = state
        .db
        .get_session(&token)
        .await?
        .ok_or_else(ApiError::invalid_session)?;

    state
        .db
        .get_user_by_id(&session.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Handler for `POST /accounts`.
pub async fn accounts_handler(
    State(state): State<AppState>,
    Json(payload): Json<AccountsRequest>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let user = resolve_user(&state, payload.token.clone()).await?;

    match payload.action.as_deref() {
        Some("list") | Some("getAccounts") => list(&state, &user).await,
        Some("add") | Some("addAccount") => add(&state, &user, payload.account_number).await,
        Some("remove") | Some("removeAccount") => {
            remove(&state, &user, payload.account_number).await
        }
        _ => Err(ApiError::invalid_action()),
    }
}

async fn list(state: &AppState, user: &User) -> Result<Json<AccountsResponse>, ApiError> {
    let accounts = state.db.list_accounts(&user.id).await?;

    Ok(Json(AccountsResponse {
        success: true,
        message: None,
        accounts: Some(accounts.into_iter().map(AccountView::from).collect()),
    }))
}

async fn add(
    state: &AppState,
    user: &User,
    account_number: Option<String>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let account_number =
        account_number.ok_or_else(|| ApiError::missing_field("accountNumber"))?;
    validate_account_number(&account_number, "accountNumber")?;

    let response = match state.db.add_account(&user.id, &account_number).await? {
        AddAccountOutcome::Added => {
            log_audit_event(AuditEvent::AccountAdded, &account_number, Some(&user.email));
            AccountsResponse::message(true, "Account added successfully")
        }
        AddAccountOutcome::LimitExceeded => {
            AccountsResponse::message(false, "Maximum 2 accounts allowed")
        }
        AddAccountOutcome::Duplicate => {
            AccountsResponse::message(false, "Account already exists")
        }
    };

    Ok(Json(response))
}

async fn remove(
    state: &AppState,
    user: &User,
    account_number: Option<String>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let account_number =
        account_number.ok_or_else(|| ApiError::missing_field("accountNumber"))?;
    validate_account_number(&account_number, "accountNumber")?;

    if !state.db.remove_account(&user.id, &account_number).await? {
        return Err(ApiError::not_found("Account"));
    }

    log_audit_event(
        AuditEvent::AccountRemoved,
        &account_number,
        Some(&user.email),
    );

    Ok(Json(AccountsResponse::message(
        true,
        "Account removed successfully",
    )))
}
