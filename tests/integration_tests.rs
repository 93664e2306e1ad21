use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

use tradelock::server::database::Database;
use tradelock::server::routes::build_router;
use tradelock::server::AppState;

const TEST_ADMIN_KEY: &str = "integration-test-admin-key";

/// Helper: create an in-memory SQLite `Database` with the schema applied.
async fn setup_in_memory_db() -> Arc<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("db connect failed");

    let db = Database::SQLite(pool);
    db.migrate().await.expect("migrate failed");
    Arc::new(db)
}

/// Spin up a temporary Tradelock server on a random port using in-memory SQLite.
async fn spawn_test_server() -> String {
    let db = setup_in_memory_db().await;
    let state = AppState {
        db,
        admin_key: TEST_ADMIN_KEY.to_string(),
    };
    let router = build_router(state);

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("server failed");
    });

    format!("http://{}", addr)
}

async fn register(client: &reqwest::Client, base: &str, name: &str, email: &str, password: &str) {
    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({
            "action": "register",
            "name": name,
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .expect("register request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["success"].as_bool().unwrap());
}

async fn login(client: &reqwest::Client, base: &str, email: &str, password: &str) -> String {
    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({
            "action": "login",
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .expect("login request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["success"].as_bool().unwrap());
    body["token"].as_str().expect("no token in response").to_string()
}

async fn add_account(client: &reqwest::Client, base: &str, token: &str, number: &str) -> Value {
    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({
            "action": "add",
            "token": token,
            "accountNumber": number,
        }))
        .send()
        .await
        .expect("add request failed");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn check_license(client: &reqwest::Client, base: &str, number: &str) -> Value {
    let response = client
        .post(format!("{base}/check-license"))
        .json(&json!({ "mt5Account": number }))
        .send()
        .await
        .expect("check request failed");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn register_then_login_roundtrip() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;
    let token = login(&client, &base, "alice@example.com", "password1").await;
    assert_eq!(token.len(), 64);

    // The minted token validates back to the same user.
    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({ "action": "validate", "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["success"].as_bool().unwrap());
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["name"], "Alice");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_registration_is_refused() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;

    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({
            "action": "register",
            "name": "Alice Again",
            "email": "alice@example.com",
            "password": "password2",
        }))
        .send()
        .await
        .unwrap();
    // Business-rule refusal: HTTP 200, success false.
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_opaque() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;

    // Wrong password for a real user and any password for an unknown user
    // must be indistinguishable.
    let mut bodies = Vec::new();
    for (email, password) in [
        ("alice@example.com", "wrong-password"),
        ("nobody@example.com", "whatever123"),
    ] {
        let response = client
            .post(format!("{base}/auth"))
            .json(&json!({ "action": "login", "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(response.text().await.unwrap());
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn invalid_session_is_unauthorized() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({
            "action": "list",
            "token": "not-a-real-token",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({ "action": "validate", "token": "not-a-real-token" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({ "action": "frobnicate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing action counts as unknown too.
    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_register_fields_are_bad_request() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({ "action": "register", "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// The full licensing scenario the add-on relies on: register, login,
/// fill the allowlist to its cap, then watch the license check flip when
/// an account is removed.
#[tokio::test]
async fn full_licensing_scenario() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;
    let token = login(&client, &base, "alice@example.com", "password1").await;

    // First add succeeds.
    let body = add_account(&client, &base, &token, "1001").await;
    assert_eq!(body["success"], true);

    // Same number again: duplicate.
    let body = add_account(&client, &base, &token, "1001").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Account already exists");

    // Second distinct number fills the cap.
    let body = add_account(&client, &base, &token, "1002").await;
    assert_eq!(body["success"], true);

    // Third one is over the limit.
    let body = add_account(&client, &base, &token, "1003").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Maximum 2 accounts allowed");

    // The list reflects exactly the two adds, in insertion order.
    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "list", "token": token }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let accounts = body["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["accountNumber"], "1001");
    assert_eq!(accounts[1]["accountNumber"], "1002");
    assert_eq!(accounts[0]["status"], "active");

    // The licensed account checks out, attributed to its owner.
    let body = check_license(&client, &base, "1001").await;
    assert_eq!(body["licensed"], true);
    assert_eq!(body["account"], "1001");
    assert_eq!(body["user"], "alice@example.com");

    // The never-added number does not.
    let body = check_license(&client, &base, "1003").await;
    assert_eq!(body["licensed"], false);
    assert!(body.get("user").is_none());

    // Remove 1001 and the check flips immediately.
    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "remove", "token": token, "accountNumber": "1001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = check_license(&client, &base, "1001").await;
    assert_eq!(body["licensed"], false);

    // Removing it again is a 404.
    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "remove", "token": token, "accountNumber": "1001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accounts_action_aliases_are_accepted() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Bob", "bob@example.com", "password1").await;
    let token = login(&client, &base, "bob@example.com", "password1").await;

    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "addAccount", "token": token, "accountNumber": "2001" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "getAccounts", "token": token }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["accounts"].as_array().unwrap().len(), 1);

    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "removeAccount", "token": token, "accountNumber": "2001" }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn account_number_is_unique_across_users() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;
    register(&client, &base, "Bob", "bob@example.com", "password2").await;
    let alice = login(&client, &base, "alice@example.com", "password1").await;
    let bob = login(&client, &base, "bob@example.com", "password2").await;

    let body = add_account(&client, &base, &alice, "3001").await;
    assert_eq!(body["success"], true);

    // Bob cannot license a number Alice already holds.
    let body = add_account(&client, &base, &bob, "3001").await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Account already exists");
}

#[tokio::test]
async fn admin_report_requires_the_shared_secret() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Alice", "alice@example.com", "password1").await;
    register(&client, &base, "Bob", "bob@example.com", "password2").await;
    let alice = login(&client, &base, "alice@example.com", "password1").await;
    add_account(&client, &base, &alice, "1001").await;
    add_account(&client, &base, &alice, "1002").await;

    // Wrong key: 401, regardless of payload.
    let response = client
        .post(format!("{base}/admin"))
        .json(&json!({ "action": "getAllUsers", "adminKey": "wrong-key" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Missing key: still 401.
    let response = client
        .post(format!("{base}/admin"))
        .json(&json!({ "action": "getAllUsers" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct key: full report with consistent totals.
    let response = client
        .post(format!("{base}/admin"))
        .json(&json!({ "action": "getAllUsers", "adminKey": TEST_ADMIN_KEY }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["totalAccounts"], 2);

    let users = body["users"].as_array().unwrap();
    let summed: usize = users
        .iter()
        .map(|u| u["accountCount"].as_u64().unwrap() as usize)
        .sum();
    assert_eq!(summed, 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
}

#[tokio::test]
async fn purchase_is_a_logged_stub() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/purchase"))
        .json(&json!({ "email": "alice@example.com", "mt5Account": "1001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "License purchased successfully");

    // The stub records intent only; nothing becomes licensed.
    let body = check_license(&client, &base, "1001").await;
    assert_eq!(body["licensed"], false);
}

#[tokio::test]
async fn responses_carry_cors_and_request_id_headers() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/check-license"))
        .json(&json!({ "mt5Account": "1001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    assert!(response.headers().contains_key("x-request-id"));

    // Preflight gets a clean 200 with the permissive headers.
    let response = client
        .request(reqwest::Method::OPTIONS, format!("{base}/auth"))
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn concurrent_adds_never_exceed_the_cap() {
    let base = spawn_test_server().await;
    let client = reqwest::Client::new();

    register(&client, &base, "Racer", "racer@example.com", "password1").await;
    let token = login(&client, &base, "racer@example.com", "password1").await;

    let mut handles = Vec::new();
    for number in ["5001", "5002", "5003", "5004", "5005"] {
        let client = client.clone();
        let base = base.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            add_account(&client, &base, &token, number).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        let body = handle.await.unwrap();
        if body["success"] == true {
            successes += 1;
        }
    }
    assert_eq!(successes, 2);

    let response = client
        .post(format!("{base}/accounts"))
        .json(&json!({ "action": "list", "token": token }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["accounts"].as_array().unwrap().len(), 2);
}
