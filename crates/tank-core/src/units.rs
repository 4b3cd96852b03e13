//! Unit handling for transmitted temperatures

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Indoor reference temperature; consumption is normalized against it
pub const REFERENCE_TEMP_C: f64 = 20.0;

/// Unit conversion error
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown temperature encoding: {0}")]
    UnknownEncoding(String),
}

/// How a probe transmits its temperature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempEncoding {
    /// Tenths of a degree, the sensor firmware default (`201` is 20.1 °C)
    #[default]
    DeciCelsius,
    Celsius,
}

impl TempEncoding {
    /// Convert a transmitted value to degrees Celsius
    pub fn to_celsius(self, raw: f64) -> f64 {
        match self {
            TempEncoding::DeciCelsius => raw / 10.0,
            TempEncoding::Celsius => raw,
        }
    }
}

impl FromStr for TempEncoding {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "decicelsius" | "deci" => Ok(TempEncoding::DeciCelsius),
            "celsius" => Ok(TempEncoding::Celsius),
            other => Err(UnitError::UnknownEncoding(other.to_string())),
        }
    }
}
