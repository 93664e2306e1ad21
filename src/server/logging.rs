//! Request logging middleware and audit events for Tradelock.
//!
//! This module provides structured logging for all API requests including:
//! - Unique request ID tracking
//! - Request timing
//! - Method, path, and status logging
//! - Request ID propagation in response headers
//!
//! It also defines the audit events emitted on every licensing-relevant
//! state change (registration, logins, account add/remove, license checks,
//! purchase intents).

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Audit event types for licensing state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// A new user registered
    UserRegistered,
    /// A login succeeded and a session was minted
    LoginSucceeded,
    /// A login attempt failed
    LoginFailed,
    /// A session token was validated
    SessionValidated,
    /// A trading account was added to a user's allowlist
    AccountAdded,
    /// A trading account was removed from a user's allowlist
    AccountRemoved,
    /// The external client checked a license
    LicenseChecked,
    /// A purchase intent was recorded
    PurchaseRecorded,
    /// The admin report was produced
    AdminReport,
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditEvent::UserRegistered => "user_registered",
            AuditEvent::LoginSucceeded => "login_succeeded",
            AuditEvent::LoginFailed => "login_failed",
            AuditEvent::SessionValidated => "session_validated",
            AuditEvent::AccountAdded => "account_added",
            AuditEvent::AccountRemoved => "account_removed",
            AuditEvent::LicenseChecked => "license_checked",
            AuditEvent::PurchaseRecorded => "purchase_recorded",
            AuditEvent::AdminReport => "admin_report",
        };
        write!(f, "{}", s)
    }
}

/// Log an audit event.
///
/// `subject` identifies what the event is about (an email, an account
/// number); `details` carries optional extra context.
pub fn log_audit_event(event: AuditEvent, subject: &str, details: Option<&str>) {
    let span = info_span!(
        "audit_event",
        event = %event,
        subject = %subject,
    );
    let _enter = span.enter();

    match event {
        AuditEvent::LoginFailed => {
            if let Some(d) = details {
                warn!(reason = %d, "Audit event occurred");
            } else {
                warn!("Audit event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Audit event occurred");
            } else {
                info!("Audit event occurred");
            }
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
///
/// This middleware:
/// 1. Generates a unique request ID for each incoming request
/// 2. Creates a tracing span with the request ID
/// 3. Logs the request method and path
/// 4. Measures and logs the response time
/// 5. Adds the request ID to the response headers
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}
