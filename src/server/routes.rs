use axum::{middleware, routing::post, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::server::accounts::accounts_handler;
use crate::server::admin::admin_handler;
use crate::server::auth::{auth_handler, AppState};
use crate::server::license::{check_license_handler, purchase_handler};
use crate::server::logging::request_logging_middleware;

/// Build the main application router for the Tradelock server.
///
/// This is a convenience helper so `main.rs` or tests can construct the
/// router in a single call.
///
/// # Routes
///
/// - `POST /auth` - register / login / validate (action-discriminated)
/// - `POST /accounts` - list / add / remove licensed accounts
/// - `POST /check-license` - license lookup for the MT5 add-on
/// - `POST /admin` - user/account report (shared secret)
/// - `POST /purchase` - purchase intent stub
///
/// The web client runs on a different origin, so every route sits behind a
/// permissive CORS layer (which also answers the `OPTIONS` preflights).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth", post(auth_handler))
        .route("/accounts", post(accounts_handler))
        .route("/check-license", post(check_license_handler))
        .route("/admin", post(admin_handler))
        .route("/purchase", post(purchase_handler))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors)
        .with_state(state)
}
