//! Tank level projection from a consumption model and temperature forecasts

use crate::ConsumptionModel;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub day: NaiveDate,
    pub mean_temp: f64,
    /// Level change over the day, negative while burning
    pub change: f64,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelForecast {
    pub start_level: f64,
    pub end_level: f64,
    pub days: Vec<ForecastDay>,
    /// Most negative daily change (coldest day)
    pub min_change: f64,
    /// Least negative daily change (warmest day)
    pub max_change: f64,
    pub warning_level: f64,
    /// First forecast day ending at or below the warning level
    pub warning_day: Option<NaiveDate>,
    /// Extrapolated warning day after the forecast at the smallest daily drop
    pub warning_best_case: Option<NaiveDate>,
    /// Extrapolated warning day after the forecast at the largest daily drop
    pub warning_worst_case: Option<NaiveDate>,
}

/// Project the level day by day, clamping at empty
///
/// Returns `None` for an empty forecast.
pub fn project_level(
    model: &ConsumptionModel,
    current_level: f64,
    forecast: &[(NaiveDate, f64)],
    warning_level: f64,
) -> Option<LevelForecast> {
    let (last_day, _) = *forecast.last()?;

    let mut level = current_level;
    let mut days = Vec::with_capacity(forecast.len());
    let mut warning_day = None;

    for &(day, mean_temp) in forecast {
        let change = -model.daily_drop(mean_temp);
        level = (level + change).max(0.0);
        if warning_day.is_none() && level <= warning_level {
            warning_day = Some(day);
        }
        days.push(ForecastDay {
            day,
            mean_temp,
            change,
            level,
        });
    }

    let min_change = days.iter().map(|d| d.change).fold(f64::INFINITY, f64::min);
    let max_change = days.iter().map(|d| d.change).fold(f64::NEG_INFINITY, f64::max);

    let extrapolate = |change: f64| -> Option<NaiveDate> {
        if warning_day.is_some() || change >= 0.0 {
            return None;
        }
        // a vanishing drop puts the date past the calendar
        let days_left = ((level - warning_level) / -change).ceil() as i64;
        Duration::try_days(days_left).and_then(|d| last_day.checked_add_signed(d))
    };

    Some(LevelForecast {
        start_level: current_level,
        end_level: level,
        warning_best_case: extrapolate(max_change),
        warning_worst_case: extrapolate(min_change),
        days,
        min_change,
        max_change,
        warning_level,
        warning_day,
    })
}
