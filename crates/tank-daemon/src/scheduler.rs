//! Message collection loop

use anyhow::{Context, Result};
use tank_ingest::{Ingestor, MessageSource};
use tracing::{error, info, warn};

/// Log ingestion counters every this many messages
const STATS_EVERY: u64 = 500;

/// Scheduler feeds source messages to the ingestor one at a time
pub struct Scheduler {
    source: Box<dyn MessageSource>,
    ingestor: Ingestor,
    running: bool,
}

impl Scheduler {
    pub fn new(source: Box<dyn MessageSource>, ingestor: Ingestor) -> Self {
        Self {
            source,
            ingestor,
            running: false,
        }
    }

    /// Run until stopped or the source ends
    ///
    /// Store failures lose the current message and the loop goes on.
    pub async fn run(&mut self) -> Result<()> {
        self.running = true;
        info!("Scheduler started with source {}", self.source.name());

        while self.running {
            let msg = self
                .source
                .next_message()
                .await
                .with_context(|| format!("Source {} failed", self.source.name()))?;

            if let Err(e) = self.ingestor.handle(&msg).await {
                error!("Error processing message on {}: {}", msg.topic, e);
            }

            let stats = self.ingestor.stats();
            if stats.total() % STATS_EVERY == 0 {
                info!(
                    "Ingested {} messages: {} stored, {} dropped, {} store failures",
                    stats.total(),
                    stats.stored,
                    stats.dropped(),
                    stats.store_failures
                );
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Process exactly one message
    #[cfg(test)]
    pub async fn step(&mut self) -> Result<tank_ingest::Outcome> {
        let msg = self
            .source
            .next_message()
            .await
            .context("Failed to get message from source")?;

        let outcome = self
            .ingestor
            .handle(&msg)
            .await
            .with_context(|| format!("Failed to store message on {}", msg.topic))?;
        Ok(outcome)
    }

    /// Stop the scheduler and the source
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping scheduler...");
        self.running = false;

        if let Err(e) = self.source.stop().await {
            warn!("Error stopping source: {}", e);
        }

        let stats = self.ingestor.stats();
        info!(
            "Scheduler stopped after {} messages ({} stored, {} invalid payload, {} unknown channel, {} unknown topic, {} device)",
            stats.total(),
            stats.stored,
            stats.invalid_payload,
            stats.unknown_channel,
            stats.unknown_topic,
            stats.discarded_device
        );
        Ok(())
    }

}
