//! Simulated tank site for testing
//!
//! Emits the same wire format as the field device: a level message followed
//! by one message per temperature channel and the device channel, all
//! carrying the device timestamp prefix.

use crate::{IngestError, IngestResult, MessageSource, RawMessage};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use tank_core::{Channel, TankId, DEVICE_CHANNEL_CODE};
use tokio::time::{sleep, Duration};

const DEVICE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Simulator source generating deterministic synthetic readings
pub struct SimulatorSource {
    tank: TankId,
    interval: u64,
    active: bool,
    clock: DateTime<Utc>,
    level_mm: f64,
    pending: VecDeque<RawMessage>,
}

impl SimulatorSource {
    /// Create a new simulator with specified interval (seconds)
    pub fn new(tank: TankId, interval: u64) -> Self {
        Self {
            tank,
            interval,
            active: false,
            clock: Utc::now(),
            level_mm: 1200.0,
            pending: VecDeque::new(),
        }
    }

    /// Start the simulated device clock at a fixed instant
    pub fn starting_at(mut self, clock: DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Outside temperature in °C following a daily cycle
    fn outside_temp(&self) -> f64 {
        let hour = self.clock.timestamp().rem_euclid(86_400) as f64 / 3600.0;
        4.0 + 6.0 * ((hour - 9.0) / 24.0 * std::f64::consts::TAU).sin()
    }

    fn generate_round(&mut self) {
        let stamp = self.clock.format(DEVICE_TIME_FORMAT).to_string();
        let outside = self.outside_temp();

        // burn rate grows as it gets colder
        let drop = (0.02 * (20.0 - outside)).max(0.0) * self.interval.max(1) as f64 / 60.0;
        self.level_mm = (self.level_mm - drop).max(0.0);

        let base = self.level_mm.round();
        let seconds = self.clock.timestamp();
        let jitter = |k: i64| ((seconds + k) % 3 - 1) as f64;

        self.pending.push_back(RawMessage {
            topic: format!("tank/{}/level", self.tank),
            payload: format!(
                "{stamp},{},{},{},1",
                base + jitter(0),
                base + jitter(1),
                base + jitter(2)
            ),
            received_at: self.clock,
        });

        for channel in Channel::ALL {
            let celsius = match channel {
                Channel::Outside => outside,
                Channel::OldBuildingSupply | Channel::NewBuildingSupply => 55.0 - outside,
                Channel::OldBuildingReturn | Channel::NewBuildingReturn => 40.0 - outside / 2.0,
            };
            self.pending.push_back(self.temp_message(channel.code(), &stamp, celsius));
        }
        self.pending
            .push_back(self.temp_message(DEVICE_CHANNEL_CODE, &stamp, 35.0));

        self.clock += ChronoDuration::seconds(self.interval.max(1) as i64);
    }

    fn temp_message(&self, code: &str, stamp: &str, celsius: f64) -> RawMessage {
        RawMessage {
            topic: format!("tank/{}/temp/{}", self.tank, code),
            payload: format!("{stamp},{}", (celsius * 10.0).round() as i64),
            received_at: self.clock,
        }
    }
}

#[async_trait::async_trait]
impl MessageSource for SimulatorSource {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn start(&mut self) -> IngestResult<()> {
        if self.active {
            return Err(IngestError::SourceError("Source already started".to_string()));
        }
        self.active = true;
        tracing::info!("Simulator source started with {}s interval", self.interval);
        Ok(())
    }

    async fn stop(&mut self) -> IngestResult<()> {
        if !self.active {
            return Err(IngestError::SourceError("Source not started".to_string()));
        }
        self.active = false;
        self.pending.clear();
        tracing::info!("Simulator source stopped");
        Ok(())
    }

    async fn next_message(&mut self) -> IngestResult<RawMessage> {
        if !self.active {
            return Err(IngestError::SourceError("Source not active".to_string()));
        }

        if self.pending.is_empty() {
            sleep(Duration::from_secs(self.interval)).await;
            self.generate_round();
        }

        self.pending
            .pop_front()
            .ok_or_else(|| IngestError::SourceError("Simulator produced no messages".to_string()))
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
