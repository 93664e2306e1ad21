use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradelock::config::init_config;
use tradelock::server::database::Database;
use tradelock::server::routes::build_router;
use tradelock::server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = init_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    // Refuse to serve an admin endpoint without a secret.
    config.require_admin_key()?;

    let db = Database::new().await?;
    db.migrate().await?;

    let state = AppState {
        db,
        admin_key: config.admin.api_key.clone(),
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Tradelock server listening on http://{addr}");

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
