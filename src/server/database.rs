use chrono::{NaiveDateTime, Utc};
use sqlx::{query, query_as, query_scalar, FromRow};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[cfg(feature = "sqlite")]
use sqlx::SqlitePool;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

use crate::config::get_config;
use crate::errors::{ServiceError, ServiceResult};

/// Per-user cap on licensed trading accounts.
pub const MAX_ACCOUNTS_PER_USER: i64 = 2;

/// A registered user, keyed by email.
///
/// Immutable after registration except for the owned account rows.
/// The password hash never crosses the API boundary.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

/// A login session. One row per successful login; no expiry.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

/// A trading account licensed under a user's subscription.
///
/// `account_number` is globally unique: one number can be licensed by at
/// most one user at a time.
#[derive(Debug, Clone, FromRow)]
pub struct LicensedAccount {
    pub id: String,
    pub user_id: String,
    pub account_number: String,
    pub status: String,
    pub added_at: NaiveDateTime,
    pub last_checked: Option<NaiveDateTime>,
}

/// Outcome of an `add_account` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddAccountOutcome {
    /// Account was inserted with status `active`.
    Added,
    /// The user already owns `MAX_ACCOUNTS_PER_USER` accounts.
    LimitExceeded,
    /// The account number is already licensed (by this or any other user).
    Duplicate,
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

/// Log a database failure and wrap it into a `ServiceError`.
///
/// The raw driver error stays in the log; callers only see a generic
/// message, so no store internals leak into HTTP responses.
fn db_err(op: &str, e: sqlx::Error) -> ServiceError {
    error!("{op} failed: {e}");
    ServiceError::Database(format!("{op} failed"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl Database {
    /// Initialize the database connection based on configuration.
    ///
    /// Uses the global configuration from `config.toml` and environment
    /// variables. See `crate::config` for configuration options.
    pub async fn new() -> ServiceResult<Arc<Self>> {
        let config = get_config()?;
        let db_config = &config.database;

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePool::connect(&db_config.sqlite_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        ServiceError::Database(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(ServiceError::Config(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPool::connect(&db_config.postgres_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        ServiceError::Database(format!("failed to connect to PostgreSQL: {e}"))
                    })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(ServiceError::Config(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(ServiceError::Config(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create the schema if it does not exist yet.
    ///
    /// `account_number` carries a global unique index: the cap-of-2 check
    /// in `add_account` handles the per-user limit, the index handles
    /// uniqueness even under concurrent inserts.
    pub async fn migrate(&self) -> ServiceResult<()> {
        let statements: &[&str] = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => &[
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            TEXT PRIMARY KEY,
                    name          TEXT NOT NULL,
                    email         TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at    TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    token      TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    email      TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS licensed_accounts (
                    id             TEXT PRIMARY KEY,
                    user_id        TEXT NOT NULL REFERENCES users(id),
                    account_number TEXT NOT NULL UNIQUE,
                    status         TEXT NOT NULL DEFAULT 'active',
                    added_at       TEXT NOT NULL,
                    last_checked   TEXT
                )
                "#,
            ],
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => &[
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            TEXT PRIMARY KEY,
                    name          TEXT NOT NULL,
                    email         TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at    TIMESTAMP NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    token      TEXT PRIMARY KEY,
                    user_id    TEXT NOT NULL,
                    email      TEXT NOT NULL,
                    created_at TIMESTAMP NOT NULL
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS licensed_accounts (
                    id             TEXT PRIMARY KEY,
                    user_id        TEXT NOT NULL REFERENCES users(id),
                    account_number TEXT NOT NULL UNIQUE,
                    status         TEXT NOT NULL DEFAULT 'active',
                    added_at       TIMESTAMP NOT NULL,
                    last_checked   TIMESTAMP
                )
                "#,
            ],
        };

        for stmt in statements {
            match self {
                #[cfg(feature = "sqlite")]
                Database::SQLite(pool) => {
                    query(stmt)
                        .execute(pool)
                        .await
                        .map_err(|e| db_err("migrate", e))?;
                }
                #[cfg(feature = "postgres")]
                Database::Postgres(pool) => {
                    query(stmt)
                        .execute(pool)
                        .await
                        .map_err(|e| db_err("migrate", e))?;
                }
            }
        }

        Ok(())
    }

    // === Users ===

    /// Insert a new user.
    ///
    /// Returns:
    /// - `Ok(Some(User))` with the stored record on success
    /// - `Ok(None)` if the email is already registered
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> ServiceResult<Option<User>> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now().naive_utc(),
        };

        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO users (id, name, email, password_hash, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .execute(pool)
                .await
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO users (id, name, email, password_hash, created_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(&user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .execute(pool)
                .await
            }
        };

        match result {
            Ok(_) => Ok(Some(user)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(db_err("create_user", e)),
        }
    }

    /// Fetch a user by email, `Ok(None)` if unknown.
    pub async fn get_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, User>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("get_user_by_email", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("get_user_by_email", e)),
        }
    }

    /// Fetch a user by id, `Ok(None)` if unknown.
    pub async fn get_user_by_id(&self, id: &str) -> ServiceResult<Option<User>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("get_user_by_id", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("get_user_by_id", e)),
        }
    }

    /// List all users, oldest registration first. Used by the admin report.
    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("list_users", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("list_users", e))
            }
        }
    }

    // === Sessions ===

    /// Store a session row for a freshly minted token.
    ///
    /// Multiple concurrent sessions per user are allowed; each login
    /// inserts its own row.
    pub async fn create_session(&self, token: &str, user: &User) -> ServiceResult<Session> {
        let session = Session {
            token: token.to_string(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            created_at: Utc::now().naive_utc(),
        };

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(
                    "INSERT INTO sessions (token, user_id, email, created_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&session.token)
                .bind(&session.user_id)
                .bind(&session.email)
                .bind(session.created_at)
                .execute(pool)
                .await
                .map_err(|e| db_err("create_session", e))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(
                    "INSERT INTO sessions (token, user_id, email, created_at) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(&session.token)
                .bind(&session.user_id)
                .bind(&session.email)
                .bind(session.created_at)
                .execute(pool)
                .await
                .map_err(|e| db_err("create_session", e))?;
            }
        }

        Ok(session)
    }

    /// Resolve a session token, `Ok(None)` if unknown.
    pub async fn get_session(&self, token: &str) -> ServiceResult<Option<Session>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
                    .bind(token)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("get_session", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, Session>("SELECT * FROM sessions WHERE token = $1")
                    .bind(token)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| db_err("get_session", e))
            }
        }
    }

    // === Licensed accounts ===

    /// List a user's licensed accounts in insertion order.
    pub async fn list_accounts(&self, user_id: &str) -> ServiceResult<Vec<LicensedAccount>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, LicensedAccount>(
                "SELECT * FROM licensed_accounts WHERE user_id = ? ORDER BY added_at",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("list_accounts", e)),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, LicensedAccount>(
                "SELECT * FROM licensed_accounts WHERE user_id = $1 ORDER BY added_at",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(|e| db_err("list_accounts", e)),
        }
    }

    /// List every licensed account across all users. Used by the admin report.
    pub async fn list_all_accounts(&self) -> ServiceResult<Vec<LicensedAccount>> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query_as::<_, LicensedAccount>("SELECT * FROM licensed_accounts ORDER BY added_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("list_all_accounts", e))
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, LicensedAccount>("SELECT * FROM licensed_accounts ORDER BY added_at")
                    .fetch_all(pool)
                    .await
                    .map_err(|e| db_err("list_all_accounts", e))
            }
        }
    }

    /// Add a licensed account for a user, enforcing the cap and uniqueness.
    ///
    /// The cap check and the insert run in one transaction. On Postgres the
    /// owning user row is locked first (`FOR UPDATE`), so concurrent adds
    /// for the same user serialize; SQLite allows a single writer at a time.
    /// The unique index on `account_number` turns a lost race into
    /// `Duplicate` instead of a third row.
    pub async fn add_account(
        &self,
        user_id: &str,
        account_number: &str,
    ) -> ServiceResult<AddAccountOutcome> {
        let account_id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let mut tx = pool.begin().await.map_err(|e| db_err("add_account", e))?;

                let count: i64 = query_scalar(
                    "SELECT COUNT(*) FROM licensed_accounts WHERE user_id = ?",
                )
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_err("add_account", e))?;

                if count >= MAX_ACCOUNTS_PER_USER {
                    return Ok(AddAccountOutcome::LimitExceeded);
                }

                let result = query(
                    "INSERT INTO licensed_accounts \
                     (id, user_id, account_number, status, added_at) \
                     VALUES (?, ?, ?, 'active', ?)",
                )
                .bind(&account_id)
                .bind(user_id)
                .bind(account_number)
                .bind(now)
                .execute(&mut *tx)
                .await;

                match result {
                    Ok(_) => {
                        tx.commit().await.map_err(|e| db_err("add_account", e))?;
                        Ok(AddAccountOutcome::Added)
                    }
                    Err(e) if is_unique_violation(&e) => Ok(AddAccountOutcome::Duplicate),
                    Err(e) => Err(db_err("add_account", e)),
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(|e| db_err("add_account", e))?;

                // Serialize concurrent adds for the same user.
                query("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_err("add_account", e))?;

                let count: i64 = query_scalar(
                    "SELECT COUNT(*) FROM licensed_accounts WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_err("add_account", e))?;

                if count >= MAX_ACCOUNTS_PER_USER {
                    return Ok(AddAccountOutcome::LimitExceeded);
                }

                let result = query(
                    "INSERT INTO licensed_accounts \
                     (id, user_id, account_number, status, added_at) \
                     VALUES ($1, $2, $3, 'active', $4)",
                )
                .bind(&account_id)
                .bind(user_id)
                .bind(account_number)
                .bind(now)
                .execute(&mut *tx)
                .await;

                match result {
                    Ok(_) => {
                        tx.commit().await.map_err(|e| db_err("add_account", e))?;
                        Ok(AddAccountOutcome::Added)
                    }
                    Err(e) if is_unique_violation(&e) => Ok(AddAccountOutcome::Duplicate),
                    Err(e) => Err(db_err("add_account", e)),
                }
            }
        }
    }

    /// Hard-delete a user's account by number.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was deleted
    /// - `Ok(false)` if no matching row was found
    pub async fn remove_account(
        &self,
        user_id: &str,
        account_number: &str,
    ) -> ServiceResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(
                "DELETE FROM licensed_accounts \
                 WHERE user_id = ? AND account_number = ?",
            )
            .bind(user_id)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| db_err("remove_account", e))?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(
                "DELETE FROM licensed_accounts \
                 WHERE user_id = $1 AND account_number = $2",
            )
            .bind(user_id)
            .bind(account_number)
            .execute(pool)
            .await
            .map_err(|e| db_err("remove_account", e))?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }

    /// Find the owner of an active licensed account.
    ///
    /// Returns the owner's email if some user currently licenses the number
    /// with status `active`, stamping `last_checked` on the matched row.
    pub async fn check_account(&self, account_number: &str) -> ServiceResult<Option<String>> {
        let now = Utc::now().naive_utc();

        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                let owner: Option<String> = query_scalar(
                    "SELECT u.email FROM licensed_accounts a \
                     JOIN users u ON u.id = a.user_id \
                     WHERE a.account_number = ? AND a.status = 'active'",
                )
                .bind(account_number)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("check_account", e))?;

                if owner.is_some() {
                    query(
                        "UPDATE licensed_accounts SET last_checked = ? \
                         WHERE account_number = ? AND status = 'active'",
                    )
                    .bind(now)
                    .bind(account_number)
                    .execute(pool)
                    .await
                    .map_err(|e| db_err("check_account", e))?;
                }

                Ok(owner)
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                let owner: Option<String> = query_scalar(
                    "SELECT u.email FROM licensed_accounts a \
                     JOIN users u ON u.id = a.user_id \
                     WHERE a.account_number = $1 AND a.status = 'active'",
                )
                .bind(account_number)
                .fetch_optional(pool)
                .await
                .map_err(|e| db_err("check_account", e))?;

                if owner.is_some() {
                    query(
                        "UPDATE licensed_accounts SET last_checked = $1 \
                         WHERE account_number = $2 AND status = 'active'",
                    )
                    .bind(now)
                    .bind(account_number)
                    .execute(pool)
                    .await
                    .map_err(|e| db_err("check_account", e))?;
                }

                Ok(owner)
            }
        }
    }
}
