//! Database query operations for the measurement tables

use crate::schema::{from_epoch_millis, to_epoch_millis, LevelRow, TempRow};
use crate::{DbClient, DbResult};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tank_core::{Channel, LevelMeasurement, TankId, TempMeasurement, TimeRange};
use tracing::{debug, instrument};

/// Closed epoch-millisecond bounds; an open side spans the whole column
fn bounds(range: &TimeRange) -> (i64, i64) {
    (
        range.from.map(to_epoch_millis).unwrap_or(i64::MIN),
        range.to.map(to_epoch_millis).unwrap_or(i64::MAX),
    )
}

/// First and last instant of one series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSpan {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

impl DbClient {
    /// Insert a single level measurement
    #[instrument(skip(self, m), fields(tank = %m.tank))]
    pub async fn insert_level(&self, m: &LevelMeasurement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO level_measurements (ts, tank_id, level_1, level_2, level_3)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_epoch_millis(m.timestamp))
        .bind(i64::from(m.tank.0))
        .bind(m.readings[0])
        .bind(m.readings[1])
        .bind(m.readings[2])
        .execute(self.pool())
        .await?;

        debug!("Inserted level measurement at {}", m.timestamp);
        Ok(())
    }

    /// Insert a single temperature measurement
    #[instrument(skip(self, m), fields(tank = %m.tank, channel = %m.channel))]
    pub async fn insert_temp(&self, m: &TempMeasurement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO temp_measurements (ts, tank_id, channel, temperature)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(to_epoch_millis(m.timestamp))
        .bind(i64::from(m.tank.0))
        .bind(m.channel.code())
        .bind(m.celsius)
        .execute(self.pool())
        .await?;

        debug!("Inserted temperature measurement at {}", m.timestamp);
        Ok(())
    }

    /// Get level measurements within a time range, oldest first
    #[instrument(skip(self))]
    pub async fn get_level_range(
        &self,
        tank: TankId,
        range: TimeRange,
    ) -> DbResult<Vec<LevelMeasurement>> {
        let (from, to) = bounds(&range);
        let rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT id, ts, tank_id, level_1, level_2, level_3
            FROM level_measurements
            WHERE tank_id = ? AND ts >= ? AND ts <= ?
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(i64::from(tank.0))
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;

        debug!("Retrieved {} level rows for tank {}", rows.len(), tank);
        rows.into_iter().map(LevelMeasurement::try_from).collect()
    }

    /// Get temperature measurements within a time range, oldest first
    #[instrument(skip(self))]
    pub async fn get_temp_range(
        &self,
        tank: TankId,
        channel: Option<Channel>,
        range: TimeRange,
    ) -> DbResult<Vec<TempMeasurement>> {
        let (from, to) = bounds(&range);
        let rows = sqlx::query_as::<_, TempRow>(
            r#"
            SELECT id, ts, tank_id, channel, temperature
            FROM temp_measurements
            WHERE tank_id = ? AND ts >= ? AND ts <= ?
              AND (? IS NULL OR channel = ?)
            ORDER BY ts ASC, id ASC
            "#,
        )
        .bind(i64::from(tank.0))
        .bind(from)
        .bind(to)
        .bind(channel.map(Channel::code))
        .bind(channel.map(Channel::code))
        .fetch_all(self.pool())
        .await?;

        debug!("Retrieved {} temperature rows for tank {}", rows.len(), tank);
        rows.into_iter().map(TempMeasurement::try_from).collect()
    }

    /// Most recent timestamp across both tables
    #[instrument(skip(self))]
    pub async fn get_latest_timestamp(&self, tank: TankId) -> DbResult<Option<DateTime<Utc>>> {
        let latest: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(ts) FROM (
                SELECT MAX(ts) AS ts FROM level_measurements WHERE tank_id = ?
                UNION ALL
                SELECT MAX(ts) AS ts FROM temp_measurements WHERE tank_id = ?
            )
            "#,
        )
        .bind(i64::from(tank.0))
        .bind(i64::from(tank.0))
        .fetch_one(self.pool())
        .await?;

        latest.map(from_epoch_millis).transpose()
    }

    /// Number of stored readings per temperature channel code
    #[instrument(skip(self))]
    pub async fn count_by_channel(&self, tank: TankId) -> DbResult<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT channel, COUNT(*) AS count
            FROM temp_measurements
            WHERE tank_id = ?
            GROUP BY channel
            ORDER BY channel
            "#,
        )
        .bind(i64::from(tank.0))
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("channel"), r.get("count")))
            .collect())
    }

    /// First/last instant of the level and temperature series
    #[instrument(skip(self))]
    pub async fn series_span(
        &self,
        tank: TankId,
    ) -> DbResult<(Option<SeriesSpan>, Option<SeriesSpan>)> {
        let level = self.span_of("level_measurements", tank).await?;
        let temp = self.span_of("temp_measurements", tank).await?;
        Ok((level, temp))
    }

    async fn span_of(&self, table: &'static str, tank: TankId) -> DbResult<Option<SeriesSpan>> {
        let query = format!("SELECT MIN(ts) AS first, MAX(ts) AS last FROM {table} WHERE tank_id = ?");
        let row = sqlx::query(&query)
            .bind(i64::from(tank.0))
            .fetch_one(self.pool())
            .await?;

        let first: Option<i64> = row.get("first");
        let last: Option<i64> = row.get("last");
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(SeriesSpan {
                first: from_epoch_millis(first)?,
                last: from_epoch_millis(last)?,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, day, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_level_round_trip_with_missing_reading() {
        let db = DbClient::in_memory().await.unwrap();
        let m = LevelMeasurement::new(ts(4, 13), TankId(1), [Some(721.0), None, Some(720.0)]);
        db.insert_level(&m).await.unwrap();

        let rows = db.get_level_range(TankId(1), TimeRange::all()).await.unwrap();
        assert_eq!(rows, vec![m]);
    }

    #[tokio::test]
    async fn test_range_is_closed_and_ordered() {
        let db = DbClient::in_memory().await.unwrap();
        for h in [12, 10, 11, 14] {
            db.insert_temp(&TempMeasurement::new(ts(4, h), TankId(1), Channel::Outside, h as f64))
                .await
                .unwrap();
        }

        let rows = db
            .get_temp_range(TankId(1), None, TimeRange::between(ts(4, 10), ts(4, 12)))
            .await
            .unwrap();
        let hours: Vec<f64> = rows.iter().map(|m| m.celsius).collect();
        assert_eq!(hours, vec![10.0, 11.0, 12.0]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_insertion_order() {
        let db = DbClient::in_memory().await.unwrap();
        db.insert_temp(&TempMeasurement::new(ts(4, 10), TankId(1), Channel::Outside, 1.0))
            .await
            .unwrap();
        db.insert_temp(&TempMeasurement::new(ts(4, 10), TankId(1), Channel::Outside, 2.0))
            .await
            .unwrap();

        let rows = db.get_temp_range(TankId(1), None, TimeRange::all()).await.unwrap();
        assert_eq!(rows[0].celsius, 1.0);
        assert_eq!(rows[1].celsius, 2.0);
    }

    #[tokio::test]
    async fn test_channel_filter_and_counts() {
        let db = DbClient::in_memory().await.unwrap();
        db.insert_temp(&TempMeasurement::new(ts(4, 10), TankId(1), Channel::Outside, 3.0))
            .await
            .unwrap();
        db.insert_temp(&TempMeasurement::new(ts(4, 10), TankId(1), Channel::OldBuildingSupply, 48.0))
            .await
            .unwrap();
        db.insert_temp(&TempMeasurement::new(ts(4, 11), TankId(1), Channel::Outside, 3.5))
            .await
            .unwrap();

        let outside = db
            .get_temp_range(TankId(1), Some(Channel::Outside), TimeRange::all())
            .await
            .unwrap();
        assert_eq!(outside.len(), 2);

        let counts = db.count_by_channel(TankId(1)).await.unwrap();
        assert_eq!(counts, vec![("1-AUS".to_string(), 2), ("2-ABV".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_latest_timestamp_and_span() {
        let db = DbClient::in_memory().await.unwrap();
        assert_eq!(db.get_latest_timestamp(TankId(1)).await.unwrap(), None);
        assert_eq!(db.series_span(TankId(1)).await.unwrap(), (None, None));

        db.insert_level(&LevelMeasurement::new(ts(3, 8), TankId(1), [Some(800.0); 3]))
            .await
            .unwrap();
        db.insert_level(&LevelMeasurement::new(ts(5, 8), TankId(1), [Some(790.0); 3]))
            .await
            .unwrap();
        db.insert_temp(&TempMeasurement::new(ts(6, 9), TankId(1), Channel::Outside, 1.0))
            .await
            .unwrap();
        db.insert_temp(&TempMeasurement::new(ts(9, 9), TankId(2), Channel::Outside, 1.0))
            .await
            .unwrap();

        assert_eq!(db.get_latest_timestamp(TankId(1)).await.unwrap(), Some(ts(6, 9)));

        let (level, temp) = db.series_span(TankId(1)).await.unwrap();
        assert_eq!(
            level,
            Some(SeriesSpan {
                first: ts(3, 8),
                last: ts(5, 8)
            })
        );
        assert_eq!(temp.map(|s| s.last), Some(ts(6, 9)));
    }
}
