//! Core data types for tank measurements

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::median::{is_valid_level_reading, median_of_valid};

/// Identifier of one monitored site (tank plus its heating circuit probes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(pub u32);

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TankId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(TankId)
    }
}

/// Temperature probe positions
///
/// Wire codes are the ones flashed into the sensor firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Outside,
    OldBuildingSupply,
    OldBuildingReturn,
    NewBuildingSupply,
    NewBuildingReturn,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Outside,
        Channel::OldBuildingSupply,
        Channel::OldBuildingReturn,
        Channel::NewBuildingSupply,
        Channel::NewBuildingReturn,
    ];

    /// Channel code used in topics and the `channel` column
    pub fn code(self) -> &'static str {
        match self {
            Channel::Outside => "1-AUS",
            Channel::OldBuildingSupply => "2-ABV",
            Channel::OldBuildingReturn => "3-ABR",
            Channel::NewBuildingSupply => "4-NBV",
            Channel::NewBuildingReturn => "5-NBR",
        }
    }

    pub fn from_code(code: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Code of the device-internal probe. Accepted on the wire, never stored.
pub const DEVICE_CHANNEL_CODE: &str = "device";

/// One reading of the three redundant level sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelMeasurement {
    pub timestamp: DateTime<Utc>,
    pub tank: TankId,
    /// Raw sensor readings; `None` marks a missing or invalid reading
    pub readings: [Option<f64>; 3],
}

impl LevelMeasurement {
    pub fn new(timestamp: DateTime<Utc>, tank: TankId, readings: [Option<f64>; 3]) -> Self {
        Self {
            timestamp,
            tank,
            readings,
        }
    }

    /// Median of the valid readings, `None` when no reading is valid
    pub fn level(&self) -> Option<f64> {
        let valid: Vec<f64> = self
            .readings
            .iter()
            .flatten()
            .copied()
            .filter(|v| is_valid_level_reading(*v))
            .collect();
        median_of_valid(&valid)
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A single temperature probe reading in degrees Celsius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempMeasurement {
    pub timestamp: DateTime<Utc>,
    pub tank: TankId,
    pub channel: Channel,
    pub celsius: f64,
}

impl TempMeasurement {
    pub fn new(timestamp: DateTime<Utc>, tank: TankId, channel: Channel, celsius: f64) -> Self {
        Self {
            timestamp,
            tank,
            channel,
            celsius,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Normalized measurement, the unit written by the ingestion path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Measurement {
    Level(LevelMeasurement),
    Temp(TempMeasurement),
}

impl Measurement {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Measurement::Level(m) => m.timestamp,
            Measurement::Temp(m) => m.timestamp,
        }
    }

    pub fn tank(&self) -> TankId {
        match self {
            Measurement::Level(m) => m.tank,
            Measurement::Temp(m) => m.tank,
        }
    }
}
