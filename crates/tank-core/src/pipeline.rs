use chrono::{DateTime, Utc};

use crate::{Channel, LevelMeasurement, Measurement, TankId, TempMeasurement, TimeRange};

/// Failure at the store seam
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only time-series store for both measurement series.
///
/// Reads return rows ordered by timestamp ascending; equal timestamps keep
/// insertion order.
#[async_trait::async_trait]
pub trait MeasurementStore: Send + Sync {
    async fn append_level(&self, measurement: &LevelMeasurement) -> StoreResult<()>;

    async fn append_temp(&self, measurement: &TempMeasurement) -> StoreResult<()>;

    async fn read_level_range(
        &self,
        tank: TankId,
        range: TimeRange,
    ) -> StoreResult<Vec<LevelMeasurement>>;

    /// `channel == None` reads every channel
    async fn read_temp_range(
        &self,
        tank: TankId,
        channel: Option<Channel>,
        range: TimeRange,
    ) -> StoreResult<Vec<TempMeasurement>>;

    /// Most recent instant across both series, `None` when the tank has no data
    async fn latest_timestamp(&self, tank: TankId) -> StoreResult<Option<DateTime<Utc>>>;

    async fn append(&self, measurement: &Measurement) -> StoreResult<()> {
        match measurement {
            Measurement::Level(m) => self.append_level(m).await,
            Measurement::Temp(m) => self.append_temp(m).await,
        }
    }
}

/// Destination for exported measurements
#[async_trait::async_trait]
pub trait MeasurementSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn emit(&mut self, measurement: &Measurement) -> Result<(), Self::Error>;
}
