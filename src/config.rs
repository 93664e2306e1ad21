//! Configuration system for Tradelock.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `TRADELOCK_SERVER_HOST` - Server bind address
//! - `TRADELOCK_SERVER_PORT` - Server port
//! - `TRADELOCK_DATABASE_TYPE` - "sqlite" or "postgres"
//! - `TRADELOCK_DATABASE_URL` - Database connection URL
//! - `TRADELOCK_ADMIN_KEY` - Shared secret for the admin report endpoint
//! - `TRADELOCK_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//!
//! The admin key has no default on purpose: the server refuses to start
//! without one rather than shipping a baked-in secret.

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{ServiceError, ServiceResult};

/// Global configuration singleton.
static CONFIG: OnceLock<TradelockConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TradelockConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Admin endpoint configuration
    pub admin: AdminConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://tradelock.db".to_string(),
            postgres_url: "postgres://localhost/tradelock".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Shared secret for `/admin`. Must be set via `TRADELOCK_ADMIN_KEY`
    /// or config.toml; empty means the endpoint is unusable.
    pub api_key: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TradelockConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    fn load() -> ServiceResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("server.host", "127.0.0.1")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("server.port", 8080)
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("database.db_type", "sqlite")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("database.sqlite_url", "sqlite://tradelock.db")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("database.postgres_url", "postgres://localhost/tradelock")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("admin.api_key", "")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| ServiceError::Config(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("TRADELOCK_SERVER_HOST").ok())
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("TRADELOCK_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option("database.db_type", env::var("TRADELOCK_DATABASE_TYPE").ok())
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option(
                "database.sqlite_url",
                env::var("TRADELOCK_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option(
                "database.postgres_url",
                env::var("TRADELOCK_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option("admin.api_key", env::var("TRADELOCK_ADMIN_KEY").ok())
            .map_err(|e| ServiceError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("TRADELOCK_LOG_LEVEL").ok())
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ServiceError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.server.port == 0 {
            return Err(ServiceError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(ServiceError::Config(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ServiceError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Validate that the admin shared secret is configured.
    ///
    /// Separate from `validate()` so tests and tooling can load a config
    /// without an admin key; the server binary requires one before serving.
    pub fn require_admin_key(&self) -> ServiceResult<()> {
        if self.admin.api_key.trim().is_empty() {
            return Err(ServiceError::Config(
                "admin.api_key is required; set TRADELOCK_ADMIN_KEY".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> ServiceResult<&'static TradelockConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = TradelockConfig::load()?;
    config.validate()?;

    // Ignore the race if another thread beat us to it
    let _ = CONFIG.set(config);

    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> ServiceResult<&'static TradelockConfig> {
    get_config()
}
