//! `MeasurementStore` implementation over SQLite

use chrono::{DateTime, Utc};
use tank_core::{
    Channel, LevelMeasurement, MeasurementStore, StoreResult, TankId, TempMeasurement, TimeRange,
};

use crate::DbClient;

#[async_trait::async_trait]
impl MeasurementStore for DbClient {
    async fn append_level(&self, measurement: &LevelMeasurement) -> StoreResult<()> {
        Ok(self.insert_level(measurement).await?)
    }

    async fn append_temp(&self, measurement: &TempMeasurement) -> StoreResult<()> {
        Ok(self.insert_temp(measurement).await?)
    }

    async fn read_level_range(
        &self,
        tank: TankId,
        range: TimeRange,
    ) -> StoreResult<Vec<LevelMeasurement>> {
        Ok(self.get_level_range(tank, range).await?)
    }

    async fn read_temp_range(
        &self,
        tank: TankId,
        channel: Option<Channel>,
        range: TimeRange,
    ) -> StoreResult<Vec<TempMeasurement>> {
        Ok(self.get_temp_range(tank, channel, range).await?)
    }

    async fn latest_timestamp(&self, tank: TankId) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.get_latest_timestamp(tank).await?)
    }
}
