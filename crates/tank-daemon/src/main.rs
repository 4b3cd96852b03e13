//! Tank monitor daemon
//!
//! This binary coordinates:
//! - MQTT (or simulated) message collection
//! - Normalization of level and temperature payloads
//! - Appending measurements to SQLite

mod config;
mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use tank_db::{DbClient, DbConnectionBuilder};
use tank_ingest::{Ingestor, MessageSource, MqttSettings, MqttSource, Normalizer, SimulatorSource};

use crate::config::{DaemonConfig, SourceKind};
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    tank_obs::init("tankd");

    info!("Starting tank monitor daemon");

    let config = DaemonConfig::from_env()?;
    info!(
        "Loaded configuration: source={:?} encoding={:?}",
        config.source, config.temp_encoding
    );

    let db_client = connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db_client.ping().await.context("Database ping failed")?;
    info!("Database connection verified");

    let mut source = build_source(&config)?;
    source.start().await.context("Failed to start source")?;
    info!("Message source started: {}", source.name());

    let ingestor = Ingestor::new(
        Arc::new(db_client.clone()),
        Normalizer::new(config.temp_encoding),
    );
    let mut scheduler = Scheduler::new(source, ingestor);

    let shutdown = setup_shutdown_handler();

    info!("Daemon running - press Ctrl+C to stop");

    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                error!("Scheduler error: {:#}", e);
                db_client.close().await;
                return Err(e);
            }
        }
        _ = shutdown => {
            info!("Shutdown signal received");
            scheduler.stop().await?;
        }
    }

    db_client.close().await;
    info!("Tank monitor daemon stopped");
    Ok(())
}

/// `sqlite:` URLs are used as given; a plain path opens the file in WAL mode
async fn connect(database_url: &str) -> Result<DbClient> {
    if database_url.starts_with("sqlite:") {
        return Ok(DbClient::new(database_url).await?);
    }
    let opts = DbConnectionBuilder::new(database_url).wal(true).build()?;
    Ok(DbClient::with_options(opts).await?)
}

fn build_source(config: &DaemonConfig) -> Result<Box<dyn MessageSource>> {
    let source: Box<dyn MessageSource> = match config.source {
        SourceKind::Mqtt => {
            let settings = MqttSettings::from_url(&config.mqtt_url, config.mqtt_client_id.clone())
                .context("Invalid MQTT_URL")?;
            Box::new(MqttSource::new(settings))
        }
        SourceKind::Simulator => Box::new(SimulatorSource::new(
            config.simulator_tank,
            config.simulator_interval,
        )),
    };
    Ok(source)
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn setup_shutdown_handler() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
