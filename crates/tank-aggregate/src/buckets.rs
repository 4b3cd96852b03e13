//! Grouping of stored readings into day and hour buckets
//!
//! Inputs are expected in store order (timestamp ascending, ties in
//! insertion order). "Last" picks the reading with the greatest timestamp,
//! the later one winning on ties.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tank_core::{
    hour_start, AggregateType, Accumulator, Channel, LevelMeasurement, MinMax, TempMeasurement,
};

/// Per-day summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,
    /// Median-of-valid of the day's last level reading
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    pub channels: BTreeMap<Channel, MinMax>,
}

/// Per-hour summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRow {
    pub hour: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    pub channels: BTreeMap<Channel, f64>,
}

/// Keep the latest reading per key
fn keep_last<'a, K: Ord>(
    slots: &mut BTreeMap<K, &'a LevelMeasurement>,
    key: K,
    m: &'a LevelMeasurement,
) {
    match slots.get(&key) {
        Some(current) if current.timestamp > m.timestamp => {}
        _ => {
            slots.insert(key, m);
        }
    }
}

/// Day rows ordered by date; empty days and day/channel pairs are omitted
pub fn daily_rows(levels: &[LevelMeasurement], temps: &[TempMeasurement]) -> Vec<DailyRow> {
    let mut last_level: BTreeMap<NaiveDate, &LevelMeasurement> = BTreeMap::new();
    for m in levels {
        keep_last(&mut last_level, m.day(), m);
    }

    let mut readings: BTreeMap<NaiveDate, BTreeMap<Channel, Vec<f64>>> = BTreeMap::new();
    for m in temps {
        readings
            .entry(m.day())
            .or_default()
            .entry(m.channel)
            .or_default()
            .push(m.celsius);
    }

    let mut days: BTreeMap<NaiveDate, DailyRow> = BTreeMap::new();
    for (date, m) in last_level {
        if let Some(level) = m.level() {
            days.entry(date).or_insert_with(|| empty_day(date)).level = Some(level);
        }
    }
    for (date, channels) in readings {
        let row = days.entry(date).or_insert_with(|| empty_day(date));
        for (channel, values) in channels {
            if let Some(range) = MinMax::from_values(values) {
                row.channels.insert(channel, range);
            }
        }
    }

    days.into_values().collect()
}

fn empty_day(date: NaiveDate) -> DailyRow {
    DailyRow {
        date,
        level: None,
        channels: BTreeMap::new(),
    }
}

/// Hour rows ordered by hour; sparse buckets are omitted
pub fn hourly_rows(levels: &[LevelMeasurement], temps: &[TempMeasurement]) -> Vec<HourlyRow> {
    let mut last_level: BTreeMap<DateTime<Utc>, &LevelMeasurement> = BTreeMap::new();
    for m in levels {
        keep_last(&mut last_level, hour_start(m.timestamp), m);
    }

    let mut last_temp: BTreeMap<(DateTime<Utc>, Channel), (DateTime<Utc>, Accumulator)> =
        BTreeMap::new();
    for m in temps {
        let (latest, acc) = last_temp
            .entry((hour_start(m.timestamp), m.channel))
            .or_insert_with(|| (m.timestamp, Accumulator::new(AggregateType::Last)));
        // an older reading arriving late never replaces a newer one
        if m.timestamp >= *latest {
            *latest = m.timestamp;
            acc.add(m.celsius);
        }
    }

    let mut hours: BTreeMap<DateTime<Utc>, HourlyRow> = BTreeMap::new();
    for (hour, m) in last_level {
        if let Some(level) = m.level() {
            hours.entry(hour).or_insert_with(|| empty_hour(hour)).level = Some(level);
        }
    }
    for ((hour, channel), (_, acc)) in last_temp {
        if let Some(value) = acc.result() {
            hours
                .entry(hour)
                .or_insert_with(|| empty_hour(hour))
                .channels
                .insert(channel, value);
        }
    }

    hours.into_values().collect()
}

fn empty_hour(hour: DateTime<Utc>) -> HourlyRow {
    HourlyRow {
        hour,
        level: None,
        channels: BTreeMap::new(),
    }
}
