// src/server/mod.rs

//! Server-side components for Tradelock.
//!
//! This module contains:
//! - `database`   → DB abstraction over SQLite/Postgres
//! - `auth`       → registration / login / session validation handlers
//! - `accounts`   → licensed-account allowlist handlers
//! - `license`    → license-check and purchase-stub handlers
//! - `admin`      → user/account report handler
//! - `api_error`  → HTTP error taxonomy
//! - `validation` → request field validation utilities
//! - `logging`    → request middleware and audit events
//! - `routes`     → router builder

pub mod accounts;
pub mod admin;
pub mod api_error;
pub mod auth;
pub mod database;
pub mod license;
pub mod logging;
pub mod routes;
pub mod validation;

// Convenient re-exports so callers can do `tradelock::server::X`
// instead of digging into submodules.

pub use accounts::{accounts_handler, AccountView, AccountsRequest, AccountsResponse};
pub use admin::{admin_handler, AdminReportResponse, AdminRequest, AdminUserView};
pub use api_error::{ApiError, ErrorCode};
pub use auth::{auth_handler, AppState, AuthRequest, AuthResponse, PublicUser};
pub use database::{
    AddAccountOutcome, Database, LicensedAccount, Session, User, MAX_ACCOUNTS_PER_USER,
};
pub use license::{
    check_license_handler, purchase_handler, CheckLicenseRequest, CheckLicenseResponse,
    PurchaseRequest, PurchaseResponse,
};
pub use logging::{log_audit_event, request_logging_middleware, AuditEvent, REQUEST_ID_HEADER};
pub use routes::build_router;
pub use validation::{
    validate_account_number, validate_email, validate_length, validate_not_empty,
    validate_password, ValidationError, ValidationResult,
};
