//! In-memory measurement store for tests and the simulator

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Channel, LevelMeasurement, MeasurementStore, StoreError, StoreResult, TankId,
    TempMeasurement, TimeRange,
};

#[derive(Default)]
struct Series {
    levels: Vec<LevelMeasurement>,
    temps: Vec<TempMeasurement>,
}

/// Vector-backed store; clones share the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    series: Arc<RwLock<Series>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub async fn len(&self) -> usize {
        let series = self.series.read().await;
        series.levels.len() + series.temps.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MeasurementStore for MemoryStore {
    async fn append_level(&self, measurement: &LevelMeasurement) -> StoreResult<()> {
        self.check()?;
        self.series.write().await.levels.push(measurement.clone());
        Ok(())
    }

    async fn append_temp(&self, measurement: &TempMeasurement) -> StoreResult<()> {
        self.check()?;
        self.series.write().await.temps.push(measurement.clone());
        Ok(())
    }

    async fn read_level_range(
        &self,
        tank: TankId,
        range: TimeRange,
    ) -> StoreResult<Vec<LevelMeasurement>> {
        self.check()?;
        let series = self.series.read().await;
        let mut rows: Vec<LevelMeasurement> = series
            .levels
            .iter()
            .filter(|m| m.tank == tank && range.contains(m.timestamp))
            .cloned()
            .collect();
        // stable: equal timestamps stay in insertion order
        rows.sort_by_key(|m| m.timestamp);
        Ok(rows)
    }

    async fn read_temp_range(
        &self,
        tank: TankId,
        channel: Option<Channel>,
        range: TimeRange,
    ) -> StoreResult<Vec<TempMeasurement>> {
        self.check()?;
        let series = self.series.read().await;
        let mut rows: Vec<TempMeasurement> = series
            .temps
            .iter()
            .filter(|m| m.tank == tank && range.contains(m.timestamp))
            .filter(|m| channel.map_or(true, |c| m.channel == c))
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.timestamp);
        Ok(rows)
    }

    async fn latest_timestamp(&self, tank: TankId) -> StoreResult<Option<DateTime<Utc>>> {
        self.check()?;
        let series = self.series.read().await;
        let level = series
            .levels
            .iter()
            .filter(|m| m.tank == tank)
            .map(|m| m.timestamp)
            .max();
        let temp = series
            .temps
            .iter()
            .filter(|m| m.tank == tank)
            .map(|m| m.timestamp)
            .max();
        Ok(level.max(temp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 4, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_reads_are_ordered_and_scoped() {
        let store = MemoryStore::new();
        store
            .append_level(&LevelMeasurement::new(ts(10), TankId(1), [Some(2.0); 3]))
            .await
            .unwrap();
        store
            .append_level(&LevelMeasurement::new(ts(8), TankId(1), [Some(1.0); 3]))
            .await
            .unwrap();
        store
            .append_level(&LevelMeasurement::new(ts(9), TankId(2), [Some(9.0); 3]))
            .await
            .unwrap();

        let rows = store.read_level_range(TankId(1), TimeRange::all()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, ts(8));
        assert_eq!(rows[1].timestamp, ts(10));
    }

    #[tokio::test]
    async fn test_latest_timestamp_spans_both_series() {
        let store = MemoryStore::new();
        assert_eq!(store.latest_timestamp(TankId(1)).await.unwrap(), None);

        store
            .append_level(&LevelMeasurement::new(ts(8), TankId(1), [Some(1.0); 3]))
            .await
            .unwrap();
        store
            .append_temp(&TempMeasurement::new(ts(11), TankId(1), Channel::Outside, 3.0))
            .await
            .unwrap();

        assert_eq!(store.latest_timestamp(TankId(1)).await.unwrap(), Some(ts(11)));
    }

    #[tokio::test]
    async fn test_channel_filter() {
        let store = MemoryStore::new();
        store
            .append_temp(&TempMeasurement::new(ts(8), TankId(1), Channel::Outside, 3.0))
            .await
            .unwrap();
        store
            .append_temp(&TempMeasurement::new(ts(8), TankId(1), Channel::NewBuildingSupply, 45.0))
            .await
            .unwrap();

        let outside = store
            .read_temp_range(TankId(1), Some(Channel::Outside), TimeRange::all())
            .await
            .unwrap();
        assert_eq!(outside.len(), 1);

        let all = store
            .read_temp_range(TankId(1), None, TimeRange::all())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.latest_timestamp(TankId(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
