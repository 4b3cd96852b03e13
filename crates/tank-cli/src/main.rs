use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tank_cli::ApiSettings;
use tank_db::DbClient;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Observability
    tank_obs::init("tank-api");

    // Config
    let cfg = tank_config::AppConfig::load().context("Failed to load configuration")?;
    let addr: SocketAddr = cfg
        .http_bind()
        .parse()
        .context("Invalid HTTP bind address")?;

    let db = DbClient::new(&cfg.database_url())
        .await
        .context("Failed to connect to database")?;

    // Build app and state
    let (app, state) = tank_cli::build_app(Arc::new(db), ApiSettings::from(&cfg))?;

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    // Mark ready just before serving
    tank_cli::set_ready(&state, true);

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
