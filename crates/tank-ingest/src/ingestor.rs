//! Ingestion boundary: normalize, store, count

use crate::{IngestError, IngestResult, MessageSource, Normalizer, RawMessage};
use serde::Serialize;
use std::sync::Arc;
use tank_core::{Measurement, MeasurementStore};
use tracing::{debug, info, warn};

/// Per-outcome message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub stored: u64,
    pub invalid_payload: u64,
    pub unknown_channel: u64,
    pub unknown_topic: u64,
    pub discarded_device: u64,
    pub store_failures: u64,
}

impl IngestStats {
    pub fn total(&self) -> u64 {
        self.stored
            + self.invalid_payload
            + self.unknown_channel
            + self.unknown_topic
            + self.discarded_device
            + self.store_failures
    }

    pub fn dropped(&self) -> u64 {
        self.invalid_payload + self.unknown_channel + self.unknown_topic
    }
}

/// What happened to one message
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Stored(Measurement),
    Discarded,
    Dropped,
}

/// Processes messages one at a time in arrival order
pub struct Ingestor {
    store: Arc<dyn MeasurementStore>,
    normalizer: Normalizer,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MeasurementStore>, normalizer: Normalizer) -> Self {
        Self {
            store,
            normalizer,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Handle one message.
    ///
    /// Parse failures are logged, counted and dropped. Store failures are
    /// counted and returned to the caller.
    pub async fn handle(&mut self, msg: &RawMessage) -> IngestResult<Outcome> {
        let measurement = match self.normalizer.normalize(msg) {
            Ok(Some(m)) => m,
            Ok(None) => {
                self.stats.discarded_device += 1;
                debug!("Discarded device reading on {}", msg.topic);
                return Ok(Outcome::Discarded);
            }
            Err(e) if e.is_recoverable() => {
                match &e {
                    IngestError::InvalidPayload(_) => self.stats.invalid_payload += 1,
                    IngestError::UnknownChannel(_) => self.stats.unknown_channel += 1,
                    _ => self.stats.unknown_topic += 1,
                }
                warn!("Dropping message on {}: {}", msg.topic, e);
                return Ok(Outcome::Dropped);
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = self.store.append(&measurement).await {
            self.stats.store_failures += 1;
            return Err(e.into());
        }

        self.stats.stored += 1;
        debug!("Stored {} measurement for tank {}", kind(&measurement), measurement.tank());
        Ok(Outcome::Stored(measurement))
    }

    /// Pull from a source until it fails
    ///
    /// Returns the error that ended the stream; parse errors never do.
    pub async fn run<S: MessageSource + ?Sized>(&mut self, source: &mut S) -> IngestError {
        info!("Ingesting from {}", source.name());
        loop {
            let msg = match source.next_message().await {
                Ok(msg) => msg,
                Err(e) => return e,
            };
            if let Err(e) = self.handle(&msg).await {
                return e;
            }
        }
    }
}

fn kind(m: &Measurement) -> &'static str {
    match m {
        Measurement::Level(_) => "level",
        Measurement::Temp(_) => "temp",
    }
}
