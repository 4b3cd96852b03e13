//! Topic/payload parsing into typed measurements
//!
//! Topics look like `tank/<id>/level` or `tank/<id>/temp/<code>`. Payloads
//! are comma separated, optionally prefixed with the device clock as
//! `dd.mm.yyyy HH:MM:SS`:
//!
//! ```text
//! tank/1/level       04.12.2025 13:01:18,721,718,720,1
//! tank/1/temp/1-AUS  04.12.2025 13:01:18,201
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use tank_core::{
    is_valid_level_reading, Channel, LevelMeasurement, Measurement, TankId, TempEncoding,
    TempMeasurement, DEVICE_CHANNEL_CODE,
};

use crate::{IngestError, IngestResult, RawMessage};

const DEVICE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Reading kind encoded in a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic<'a> {
    Level(TankId),
    Temp(TankId, &'a str),
}

impl<'a> Topic<'a> {
    pub fn parse(topic: &'a str) -> IngestResult<Self> {
        let unknown = || IngestError::UnknownTopic(topic.to_string());
        let parts: Vec<&str> = topic.split('/').collect();

        let tank = match parts.as_slice() {
            ["tank", id, ..] if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {
                id.parse::<TankId>().map_err(|_| unknown())?
            }
            _ => return Err(unknown()),
        };

        match parts.as_slice() {
            [_, _, "level"] => Ok(Topic::Level(tank)),
            [_, _, "temp", code] if !code.is_empty() => Ok(Topic::Temp(tank, code)),
            _ => Err(unknown()),
        }
    }
}

/// Converts raw messages into measurements; no side effects
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    temp_encoding: TempEncoding,
}

impl Normalizer {
    pub fn new(temp_encoding: TempEncoding) -> Self {
        Self { temp_encoding }
    }

    pub fn temp_encoding(&self) -> TempEncoding {
        self.temp_encoding
    }

    /// Parse one message.
    ///
    /// Returns `Ok(None)` for a well-formed `device` reading, which is
    /// validated and then discarded.
    pub fn normalize(&self, msg: &RawMessage) -> IngestResult<Option<Measurement>> {
        self.normalize_parts(&msg.topic, &msg.payload, msg.received_at)
    }

    pub fn normalize_parts(
        &self,
        topic: &str,
        payload: &str,
        received_at: DateTime<Utc>,
    ) -> IngestResult<Option<Measurement>> {
        match Topic::parse(topic)? {
            Topic::Level(tank) => {
                let (timestamp, fields) = split_payload(payload, received_at)?;
                let readings = parse_level_fields(payload, &fields)?;
                Ok(Some(Measurement::Level(LevelMeasurement::new(
                    timestamp, tank, readings,
                ))))
            }
            Topic::Temp(tank, code) => {
                let channel = match Channel::from_code(code) {
                    Some(channel) => Some(channel),
                    None if code == DEVICE_CHANNEL_CODE => None,
                    None => return Err(IngestError::UnknownChannel(code.to_string())),
                };

                let (timestamp, fields) = split_payload(payload, received_at)?;
                let raw = parse_temp_fields(payload, &fields)?;

                Ok(channel.map(|channel| {
                    Measurement::Temp(TempMeasurement::new(
                        timestamp,
                        tank,
                        channel,
                        self.temp_encoding.to_celsius(raw),
                    ))
                }))
            }
        }
    }
}

/// Split off the optional device timestamp; the rest are value fields
fn split_payload(payload: &str, received_at: DateTime<Utc>) -> IngestResult<(DateTime<Utc>, Vec<&str>)> {
    if payload.contains(char::REPLACEMENT_CHARACTER) {
        return Err(IngestError::InvalidPayload(format!("payload is not UTF-8: {payload:?}")));
    }
    let mut fields: Vec<&str> = payload.split(',').map(str::trim).collect();

    let first = fields[0];
    if first.is_empty() || first.parse::<f64>().is_ok() {
        return Ok((received_at, fields));
    }

    let timestamp = NaiveDateTime::parse_from_str(first, DEVICE_TIME_FORMAT)
        .map_err(|_| IngestError::InvalidPayload(format!("not a number or timestamp: {payload:?}")))?
        .and_utc();
    fields.remove(0);
    Ok((timestamp, fields))
}

fn parse_level_fields(payload: &str, fields: &[&str]) -> IngestResult<[Option<f64>; 3]> {
    if fields.len() < 3 {
        return Err(IngestError::InvalidPayload(format!(
            "level needs 3 readings, got {}: {payload:?}",
            fields.len()
        )));
    }

    // fields beyond the third are reserved and ignored
    let mut readings = [None; 3];
    for (slot, field) in readings.iter_mut().zip(fields) {
        if field.is_empty() {
            continue;
        }
        let value = field
            .parse::<f64>()
            .map_err(|_| IngestError::InvalidPayload(format!("bad level reading {field:?}")))?;
        *slot = is_valid_level_reading(value).then_some(value);
    }
    Ok(readings)
}

fn parse_temp_fields(payload: &str, fields: &[&str]) -> IngestResult<f64> {
    let [field] = fields else {
        return Err(IngestError::InvalidPayload(format!(
            "temperature needs exactly 1 value, got {}: {payload:?}",
            fields.len()
        )));
    };

    let value = field
        .parse::<f64>()
        .map_err(|_| IngestError::InvalidPayload(format!("bad temperature {field:?}")))?;
    if !value.is_finite() {
        return Err(IngestError::InvalidPayload(format!("bad temperature {field:?}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap()
    }

    fn level(payload: &str) -> IngestResult<LevelMeasurement> {
        match Normalizer::default().normalize_parts("tank/1/level", payload, now())? {
            Some(Measurement::Level(m)) => Ok(m),
            other => panic!("expected level measurement, got {other:?}"),
        }
    }

    #[test]
    fn test_topic_parsing() {
        assert_eq!(Topic::parse("tank/1/level").unwrap(), Topic::Level(TankId(1)));
        assert_eq!(
            Topic::parse("tank/12/temp/1-AUS").unwrap(),
            Topic::Temp(TankId(12), "1-AUS")
        );
        for bad in ["tank/x/level", "tank//level", "house/1/level", "tank/1/temp", "tank/1/level/x"] {
            assert!(matches!(Topic::parse(bad), Err(IngestError::UnknownTopic(_))), "{bad}");
        }
    }

    #[test]
    fn test_level_with_device_timestamp() {
        let m = level("04.12.2025 13:01:18,721,718,720,1").unwrap();
        assert_eq!(m.timestamp, Utc.with_ymd_and_hms(2025, 12, 4, 13, 1, 18).unwrap());
        assert_eq!(m.tank, TankId(1));
        assert_eq!(m.readings, [Some(721.0), Some(718.0), Some(720.0)]);
    }

    #[test]
    fn test_level_uses_first_three_fields_only() {
        let m = level("1000,1010,1005,999").unwrap();
        assert_eq!(m.readings, [Some(1000.0), Some(1010.0), Some(1005.0)]);
        assert_eq!(m.timestamp, now());

        let with_extras = level("1000,1010,1005,1,2,3").unwrap();
        assert_eq!(with_extras.level(), m.level());
    }

    #[test]
    fn test_level_extra_fields_are_not_validated() {
        let m = level("900,905,895,garbage").unwrap();
        assert_eq!(m.level(), Some(900.0));
    }

    #[test]
    fn test_level_invalid_readings_become_missing() {
        let m = level("900,0,910").unwrap();
        assert_eq!(m.readings, [Some(900.0), None, Some(910.0)]);

        let m = level("900,,910").unwrap();
        assert_eq!(m.readings, [Some(900.0), None, Some(910.0)]);
    }

    #[test]
    fn test_level_too_few_fields() {
        assert!(matches!(level("721,718"), Err(IngestError::InvalidPayload(_))));
        assert!(matches!(
            level("04.12.2025 13:01:18,721,718"),
            Err(IngestError::InvalidPayload(_))
        ));
        assert!(matches!(level(""), Err(IngestError::InvalidPayload(_))));
    }

    #[test]
    fn test_level_non_numeric_reading() {
        assert!(matches!(level("721,abc,720"), Err(IngestError::InvalidPayload(_))));
        assert!(matches!(level("yesterday,1,2,3"), Err(IngestError::InvalidPayload(_))));
    }

    #[test]
    fn test_temp_decicelsius_default() {
        let result = Normalizer::default()
            .normalize_parts("tank/1/temp/1-AUS", "04.12.2025 13:01:18,201", now())
            .unwrap();
        match result {
            Some(Measurement::Temp(m)) => {
                assert_eq!(m.channel, Channel::Outside);
                assert!((m.celsius - 20.1).abs() < 1e-9);
            }
            other => panic!("expected temperature, got {other:?}"),
        }
    }

    #[test]
    fn test_temp_celsius_encoding() {
        let result = Normalizer::new(TempEncoding::Celsius)
            .normalize_parts("tank/1/temp/4-NBV", "47.5", now())
            .unwrap();
        match result {
            Some(Measurement::Temp(m)) => {
                assert_eq!(m.channel, Channel::NewBuildingSupply);
                assert_eq!(m.celsius, 47.5);
                assert_eq!(m.timestamp, now());
            }
            other => panic!("expected temperature, got {other:?}"),
        }
    }

    #[test]
    fn test_temp_requires_exactly_one_value() {
        let n = Normalizer::default();
        for payload in ["", "201,202", "04.12.2025 13:01:18", "abc", "NaN"] {
            let result = n.normalize_parts("tank/1/temp/1-AUS", payload, now());
            assert!(matches!(result, Err(IngestError::InvalidPayload(_))), "{payload:?}");
        }
    }

    #[test]
    fn test_device_channel_is_validated_then_discarded() {
        let n = Normalizer::default();
        let ok = n.normalize_parts("tank/1/temp/device", "04.12.2025 13:01:18,312", now());
        assert!(matches!(ok, Ok(None)));

        let bad = n.normalize_parts("tank/1/temp/device", "hot", now());
        assert!(matches!(bad, Err(IngestError::InvalidPayload(_))));
    }

    #[test]
    fn test_unknown_channel() {
        let result = Normalizer::default().normalize_parts("tank/1/temp/9-XYZ", "201", now());
        match result {
            Err(IngestError::UnknownChannel(code)) => assert_eq!(code, "9-XYZ"),
            other => panic!("expected unknown channel, got {other:?}"),
        }
    }
}
