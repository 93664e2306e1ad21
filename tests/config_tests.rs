use std::env;

use serial_test::serial;

use tradelock::config::{get_config, TradelockConfig};

#[test]
fn defaults_validate() {
    let config = TradelockConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.db_type, "sqlite");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn admin_key_is_required_separately() {
    let config = TradelockConfig::default();
    // A config without an admin key is loadable (tests, tooling) ...
    assert!(config.validate().is_ok());
    // ... but the server refuses to serve with it.
    assert!(config.require_admin_key().is_err());

    let mut config = TradelockConfig::default();
    config.admin.api_key = "some-secret".to_string();
    assert!(config.require_admin_key().is_ok());
}

#[test]
fn bad_values_fail_validation() {
    let mut config = TradelockConfig::default();
    config.server.port = 0;
    assert!(config.validate().is_err());

    let mut config = TradelockConfig::default();
    config.database.db_type = "mongodb".to_string();
    assert!(config.validate().is_err());

    let mut config = TradelockConfig::default();
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn env_overrides_reach_the_global_config() {
    // get_config caches globally, so this is the only test allowed to
    // touch it; set the env before the first load.
    env::set_var("TRADELOCK_ADMIN_KEY", "env-admin-key");
    env::set_var("TRADELOCK_SERVER_PORT", "9191");

    let config = get_config().expect("config load failed");
    assert_eq!(config.admin.api_key, "env-admin-key");
    assert_eq!(config.server.port, 9191);
    assert!(config.require_admin_key().is_ok());

    env::remove_var("TRADELOCK_ADMIN_KEY");
    env::remove_var("TRADELOCK_SERVER_PORT");
}
