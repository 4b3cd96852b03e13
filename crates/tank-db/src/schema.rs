//! Table layout and row types
//!
//! Timestamps are stored as Unix epoch milliseconds (UTC). Level readings
//! are nullable; `NULL` marks a missing or invalid sensor reading.

use crate::{DbError, DbResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tank_core::{Channel, LevelMeasurement, TankId, TempMeasurement};

/// Table names
pub mod tables {
    pub const LEVEL: &str = "level_measurements";
    pub const TEMP: &str = "temp_measurements";
}

/// Bootstrap statements, executed in order
pub const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS level_measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts INTEGER NOT NULL,
        tank_id INTEGER NOT NULL,
        level_1 REAL,
        level_2 REAL,
        level_3 REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS temp_measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts INTEGER NOT NULL,
        tank_id INTEGER NOT NULL,
        channel TEXT NOT NULL,
        temperature REAL NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_level_tank_ts ON level_measurements(tank_id, ts)",
    "CREATE INDEX IF NOT EXISTS idx_temp_tank_ts ON temp_measurements(tank_id, ts, channel)",
];

/// Level table record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LevelRow {
    pub id: i64,
    pub ts: i64,
    pub tank_id: i64,
    pub level_1: Option<f64>,
    pub level_2: Option<f64>,
    pub level_3: Option<f64>,
}

/// Temperature table record, `temperature` in °C
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TempRow {
    pub id: i64,
    pub ts: i64,
    pub tank_id: i64,
    pub channel: String,
    pub temperature: f64,
}

pub fn to_epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_epoch_millis(ms: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::CorruptRow(format!("timestamp out of range: {ms}")))
}

fn tank_from_row(tank_id: i64) -> DbResult<TankId> {
    u32::try_from(tank_id)
        .map(TankId)
        .map_err(|_| DbError::CorruptRow(format!("tank id out of range: {tank_id}")))
}

impl TryFrom<LevelRow> for LevelMeasurement {
    type Error = DbError;

    fn try_from(row: LevelRow) -> DbResult<Self> {
        Ok(LevelMeasurement::new(
            from_epoch_millis(row.ts)?,
            tank_from_row(row.tank_id)?,
            [row.level_1, row.level_2, row.level_3],
        ))
    }
}

impl TryFrom<TempRow> for TempMeasurement {
    type Error = DbError;

    fn try_from(row: TempRow) -> DbResult<Self> {
        let channel = Channel::from_code(&row.channel)
            .ok_or_else(|| DbError::CorruptRow(format!("unknown channel code: {}", row.channel)))?;
        Ok(TempMeasurement::new(
            from_epoch_millis(row.ts)?,
            tank_from_row(row.tank_id)?,
            channel,
            row.temperature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_table_names() {
        assert_eq!(tables::LEVEL, "level_measurements");
        assert_eq!(tables::TEMP, "temp_measurements");
        assert!(SCHEMA.iter().any(|s| s.contains(tables::LEVEL)));
    }

    #[test]
    fn test_epoch_millis_conversion() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 4, 13, 1, 18).unwrap();
        assert_eq!(from_epoch_millis(to_epoch_millis(ts)).unwrap(), ts);
    }

    #[test]
    fn test_unknown_channel_row_is_corrupt() {
        let row = TempRow {
            id: 1,
            ts: 0,
            tank_id: 1,
            channel: "device".into(),
            temperature: 21.0,
        };
        let result = TempMeasurement::try_from(row);
        assert!(matches!(result, Err(DbError::CorruptRow(_))));
    }

    #[test]
    fn test_level_row_keeps_null_readings() {
        let row = LevelRow {
            id: 1,
            ts: 1_764_853_278_000,
            tank_id: 1,
            level_1: Some(721.0),
            level_2: None,
            level_3: Some(720.0),
        };
        let m = LevelMeasurement::try_from(row).unwrap();
        assert_eq!(m.readings, [Some(721.0), None, Some(720.0)]);
        assert_eq!(m.level(), Some(720.5));
    }
}
