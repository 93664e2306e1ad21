//! Tradelock - licensing backend for an MT5 trading-account add-on.
//!
//! The server exposes five JSON endpoints:
//!
//! - `/auth` - user registration, login, session validation
//! - `/accounts` - per-user trading-account allowlisting (max 2)
//! - `/check-license` - is a given account number licensed right now?
//! - `/admin` - full user/account report, gated by a shared secret
//! - `/purchase` - purchase intent stub (logged only)
//!
//! # Features
//!
//! Database backends are selected via feature flags:
//!
//! - `sqlite` - SQLite backend (enabled by default)
//! - `postgres` - PostgreSQL backend
//!
//! ```toml
//! # Use defaults (sqlite)
//! tradelock = "0.1"
//!
//! # PostgreSQL backend
//! tradelock = { version = "0.1", default-features = false, features = ["postgres"] }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod password;

// Server modules
#[path = "server/mod.rs"]
pub mod server;
