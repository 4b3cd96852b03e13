//! Daily consumption samples normalized by outside temperature

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tank_core::{Accumulator, AggregateType, LevelMeasurement, TempMeasurement, REFERENCE_TEMP_C};

/// Consumption of one day against that day's mean outside temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSample {
    pub day: NaiveDate,
    /// Level drop since the previous day divided by `mean_temp - 20 °C`
    pub rate: f64,
    pub mean_temp: f64,
    /// Outside readings behind `mean_temp`, duplicates included
    pub temp_readings: usize,
}

/// Regression inputs of one calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct DayInput {
    pub day: NaiveDate,
    /// Median-of-valid of the day's last level reading
    pub end_level: Option<f64>,
    pub mean_temp: Option<f64>,
    pub temp_readings: usize,
}

/// Collect per-day end level and mean outside temperature, ordered by day
///
/// `outside` must contain outside-channel readings only.
pub fn daily_inputs(levels: &[LevelMeasurement], outside: &[TempMeasurement]) -> Vec<DayInput> {
    let mut last_level: BTreeMap<NaiveDate, &LevelMeasurement> = BTreeMap::new();
    for m in levels {
        match last_level.get(&m.day()) {
            Some(current) if current.timestamp > m.timestamp => {}
            _ => {
                last_level.insert(m.day(), m);
            }
        }
    }

    let mut means: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for m in outside {
        means
            .entry(m.day())
            .or_insert_with(|| Accumulator::new(AggregateType::Mean))
            .add(m.celsius);
    }

    let mut days: BTreeMap<NaiveDate, DayInput> = BTreeMap::new();
    for (day, m) in last_level {
        days.entry(day).or_insert_with(|| empty_input(day)).end_level = m.level();
    }
    for (day, acc) in means {
        let input = days.entry(day).or_insert_with(|| empty_input(day));
        input.mean_temp = acc.result();
        input.temp_readings = acc.count();
    }

    days.into_values().collect()
}

fn empty_input(day: NaiveDate) -> DayInput {
    DayInput {
        day,
        end_level: None,
        mean_temp: None,
        temp_readings: 0,
    }
}

/// Pair calendar-adjacent days into samples
///
/// A day yields a sample when it and the previous calendar day both have
/// an end level and the day has a mean outside temperature other than the
/// reference temperature. Refills show up as positive level changes and are
/// kept.
pub fn consumption_samples(inputs: &[DayInput]) -> Vec<ConsumptionSample> {
    inputs
        .windows(2)
        .filter_map(|pair| {
            let (prev, day) = (&pair[0], &pair[1]);
            if prev.day.succ_opt() != Some(day.day) {
                return None;
            }

            let prev_level = prev.end_level?;
            let level = day.end_level?;
            let mean_temp = day.mean_temp?;
            if mean_temp == REFERENCE_TEMP_C {
                return None;
            }

            Some(ConsumptionSample {
                day: day.day,
                rate: (prev_level - level) / (mean_temp - REFERENCE_TEMP_C),
                mean_temp,
                temp_readings: day.temp_readings,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tank_core::{Channel, TankId};

    fn at(day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, day, h, 0, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn input(day: u32, end_level: Option<f64>, mean_temp: Option<f64>) -> DayInput {
        DayInput {
            day: date(day),
            end_level,
            mean_temp,
            temp_readings: usize::from(mean_temp.is_some()),
        }
    }

    #[test]
    fn test_daily_inputs() {
        let levels = vec![
            LevelMeasurement::new(at(4, 6), TankId(1), [Some(1000.0); 3]),
            LevelMeasurement::new(at(4, 22), TankId(1), [Some(990.0), Some(992.0), None]),
        ];
        let outside = vec![
            TempMeasurement::new(at(4, 3), TankId(1), Channel::Outside, 2.0),
            TempMeasurement::new(at(4, 15), TankId(1), Channel::Outside, 6.0),
            TempMeasurement::new(at(5, 3), TankId(1), Channel::Outside, 1.0),
        ];

        let inputs = daily_inputs(&levels, &outside);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].end_level, Some(991.0));
        assert_eq!(inputs[0].mean_temp, Some(4.0));
        assert_eq!(inputs[0].temp_readings, 2);
        assert_eq!(inputs[1].end_level, None);
        assert_eq!(inputs[1].mean_temp, Some(1.0));
    }

    #[test]
    fn test_duplicate_readings_count_in_mean() {
        let outside = vec![
            TempMeasurement::new(at(4, 3), TankId(1), Channel::Outside, 2.0),
            TempMeasurement::new(at(4, 3), TankId(1), Channel::Outside, 2.0),
            TempMeasurement::new(at(4, 15), TankId(1), Channel::Outside, 8.0),
        ];
        let inputs = daily_inputs(&[], &outside);
        assert_eq!(inputs[0].mean_temp, Some(4.0));
        assert_eq!(inputs[0].temp_readings, 3);
    }

    #[test]
    fn test_rate_of_adjacent_days() {
        let samples = consumption_samples(&[
            input(1, Some(1005.0), Some(10.0)),
            input(2, Some(900.0), Some(15.0)),
        ]);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].day, date(2));
        assert_eq!(samples[0].rate, -21.0);
        assert_eq!(samples[0].mean_temp, 15.0);
    }

    #[test]
    fn test_gap_day_breaks_pair() {
        let samples = consumption_samples(&[
            input(1, Some(1000.0), Some(5.0)),
            input(3, Some(940.0), Some(5.0)),
        ]);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_reference_temperature_day_is_dropped() {
        let samples = consumption_samples(&[
            input(1, Some(1000.0), Some(5.0)),
            input(2, Some(990.0), Some(20.0)),
            input(3, Some(970.0), Some(10.0)),
        ]);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].day, date(3));
        assert_eq!(samples[0].rate, -2.0);
    }

    #[test]
    fn test_missing_level_or_temperature_yields_no_sample() {
        let samples = consumption_samples(&[
            input(1, Some(1000.0), Some(5.0)),
            input(2, None, Some(5.0)),
            input(3, Some(970.0), Some(5.0)),
            input(4, Some(960.0), None),
        ]);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_refill_is_kept() {
        let samples = consumption_samples(&[
            input(1, Some(300.0), Some(0.0)),
            input(2, Some(1400.0), Some(0.0)),
        ]);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].rate, 55.0);
    }
}
