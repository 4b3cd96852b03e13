//! Text output of `tank-report`

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tank_analysis::{project_level, Goodness, LevelForecast, RegressionReport};
use tank_core::{MeasurementStore, StoreResult, TankId, TimeRange, REFERENCE_TEMP_C};
use tank_export::read_coefficients;

const RULE: &str = "--------------------------------------------------------------------------------";

/// One line of a temperature forecast file
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ForecastInput {
    pub day: NaiveDate,
    pub mean_temp: f64,
}

/// Parse a JSON array of `{"day": "YYYY-MM-DD", "mean_temp": <°C>}`
pub fn parse_forecast_input(json: &str) -> serde_json::Result<Vec<(NaiveDate, f64)>> {
    let mut days: Vec<ForecastInput> = serde_json::from_str(json)?;
    days.sort_by_key(|d| d.day);
    Ok(days.into_iter().map(|d| (d.day, d.mean_temp)).collect())
}

/// Level of the most recent reading with at least one valid sensor, no
/// more than a day older than the last level row
pub async fn current_level(store: &dyn MeasurementStore, tank: TankId) -> StoreResult<Option<f64>> {
    let levels = store.read_level_range(tank, TimeRange::all()).await?;
    let Some(last) = levels.last() else {
        return Ok(None);
    };
    let since = last.timestamp - Duration::days(1);
    Ok(levels
        .iter()
        .rev()
        .take_while(|m| m.timestamp >= since)
        .find_map(|m| m.level()))
}

/// Project the current level with the model stored in `env_file` over the
/// temperatures in `temps`
pub async fn build_forecast(
    store: &dyn MeasurementStore,
    tank: TankId,
    temps: &Path,
    warning: f64,
    env_file: &Path,
) -> Result<LevelForecast> {
    let model = read_coefficients(env_file)
        .with_context(|| format!("Failed to read {}", env_file.display()))?
        .with_context(|| {
            format!(
                "No coefficients in {}, run `tank-report analyze --env-file` first",
                env_file.display()
            )
        })?;

    let input = std::fs::read_to_string(temps)
        .with_context(|| format!("Failed to read {}", temps.display()))?;
    let days = parse_forecast_input(&input).context("Invalid forecast file")?;

    let level = current_level(store, tank)
        .await?
        .with_context(|| format!("No level readings for tank {tank}"))?;

    project_level(&model, level, &days, warning).context("Forecast file has no days")
}

/// Sample table, fitted line and its interpretation
pub struct RegressionSummary<'a>(pub &'a RegressionReport);

impl fmt::Display for RegressionSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Consumption vs. outside temperature, tank {}", r.tank)?;
        match (r.from, r.to) {
            (Some(from), Some(to)) => {
                writeln!(f, "Period: {} to {}", from.date_naive(), to.date_naive())?
            }
            (Some(from), None) => writeln!(f, "Period: from {}", from.date_naive())?,
            (None, Some(to)) => writeln!(f, "Period: until {}", to.date_naive())?,
            (None, None) => writeln!(f, "Period: all data")?,
        }
        writeln!(f, "{RULE}")?;
        writeln!(f, "{:<12} {:>10} {:>10} {:>8}", "Day", "Rate", "T mean", "Temps")?;
        for s in &r.samples {
            writeln!(
                f,
                "{:<12} {:>10.4} {:>10.2} {:>8}",
                s.day.to_string(),
                s.rate,
                s.mean_temp,
                s.temp_readings
            )?;
        }
        writeln!(f, "{RULE}")?;

        writeln!(f, "Samples:           {}", r.sample_count)?;
        writeln!(f, "Rate = {:.4} * T + {:.4}", r.slope, r.intercept)?;
        writeln!(
            f,
            "Level drop per day = rate * (T - {REFERENCE_TEMP_C:.0}), zero at {REFERENCE_TEMP_C:.0} °C"
        )?;
        writeln!(f, "Correlation (r):   {:.4}", r.r)?;
        writeln!(f, "R²:                {:.4}", r.r_squared)?;
        match r.p_value {
            Some(p) => writeln!(f, "p-value:           {p:.6}")?,
            None => writeln!(f, "p-value:           n/a")?,
        }
        match r.std_err {
            Some(se) => writeln!(f, "Standard error:    {se:.4}")?,
            None => writeln!(f, "Standard error:    n/a")?,
        }

        writeln!(f, "{RULE}")?;
        let fit = match r.quality.goodness {
            Goodness::Good => "well suited (R² > 0.7)",
            Goodness::Acceptable => "acceptable (R² > 0.5)",
            Goodness::Poor => "poorly suited (R² <= 0.5)",
        };
        writeln!(f, "Linear model is {fit}")?;
        match r.quality.significant {
            Some(true) => writeln!(f, "Slope is significant (p < 0.05)")?,
            Some(false) => writeln!(f, "Slope is not significant (p >= 0.05)")?,
            None => writeln!(f, "Too few samples to test the slope")?,
        }
        Ok(())
    }
}

/// Day-by-day level projection
pub struct ForecastSummary<'a>(pub &'a LevelForecast);

impl fmt::Display for ForecastSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fc = self.0;
        writeln!(f, "Current level:     {:.1}", fc.start_level)?;
        writeln!(f, "{:<12} {:>8} {:>10} {:>10}", "Day", "T mean", "Change", "Level")?;
        for d in &fc.days {
            writeln!(
                f,
                "{:<12} {:>8.1} {:>10.1} {:>10.1}",
                d.day.to_string(),
                d.mean_temp,
                d.change,
                d.level
            )?;
        }
        writeln!(f, "Level after forecast: {:.1}", fc.end_level)?;
        writeln!(
            f,
            "Daily change:      {:.1} to {:.1}",
            fc.min_change, fc.max_change
        )?;

        if let Some(day) = fc.warning_day {
            writeln!(f, "Warning level {:.1} reached on {day}", fc.warning_level)?;
        } else {
            match (fc.warning_worst_case, fc.warning_best_case) {
                (Some(worst), Some(best)) => writeln!(
                    f,
                    "Warning level {:.1} expected between {worst} and {best}",
                    fc.warning_level
                )?,
                (Some(worst), None) => writeln!(
                    f,
                    "Warning level {:.1} expected from {worst}",
                    fc.warning_level
                )?,
                _ => writeln!(f, "Warning level {:.1} not in sight", fc.warning_level)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tank_analysis::{ConsumptionModel, FitQuality};
    use tank_core::{Channel, LevelMeasurement, MemoryStore, TempMeasurement};
    use tank_export::write_coefficients;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    #[test]
    fn parses_and_sorts_forecast_input() {
        let days = parse_forecast_input(
            r#"[{"day":"2026-01-03","mean_temp":1.5},{"day":"2026-01-02","mean_temp":-2}]"#,
        )
        .unwrap();
        assert_eq!(days, vec![(date(2), -2.0), (date(3), 1.5)]);
        assert!(parse_forecast_input(r#"[{"day":"tomorrow","mean_temp":1}]"#).is_err());
    }

    #[tokio::test]
    async fn current_level_skips_invalid_readings() {
        let store = MemoryStore::new();
        assert_eq!(current_level(&store, TankId(1)).await.unwrap(), None);

        let t = |h| Utc.with_ymd_and_hms(2026, 1, 5, h, 0, 0).unwrap();
        store
            .append_level(&LevelMeasurement::new(t(8), TankId(1), [Some(800.0), Some(802.0), Some(801.0)]))
            .await
            .unwrap();
        store
            .append_level(&LevelMeasurement::new(t(9), TankId(1), [None, Some(0.0), None]))
            .await
            .unwrap();

        assert_eq!(current_level(&store, TankId(1)).await.unwrap(), Some(801.0));
    }

    #[tokio::test]
    async fn current_level_ignores_later_temperatures() {
        let store = MemoryStore::new();
        let t = |d, h| Utc.with_ymd_and_hms(2026, 1, d, h, 0, 0).unwrap();
        store
            .append_level(&LevelMeasurement::new(t(5, 8), TankId(1), [Some(640.0); 3]))
            .await
            .unwrap();
        for d in 6..=9 {
            store
                .append_temp(&TempMeasurement::new(t(d, 12), TankId(1), Channel::Outside, -3.0))
                .await
                .unwrap();
        }

        assert_eq!(current_level(&store, TankId(1)).await.unwrap(), Some(640.0));
    }

    fn report(slope: f64, intercept: f64) -> RegressionReport {
        RegressionReport {
            tank: TankId(1),
            from: None,
            to: None,
            slope,
            intercept,
            r_squared: 1.0,
            r: -1.0,
            std_err: None,
            p_value: None,
            sample_count: 0,
            quality: FitQuality::assess(1.0, None),
            samples: Vec::new(),
        }
    }

    #[tokio::test]
    async fn forecast_from_env_and_temperature_files() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        let temps = dir.path().join("temps.json");

        let store = MemoryStore::new();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 21, 0, 0).unwrap();
        store
            .append_level(&LevelMeasurement::new(t, TankId(1), [Some(100.0); 3]))
            .await
            .unwrap();

        // no coefficients yet
        std::fs::write(&env_file, "MQTT_URL=mqtt://broker\n").unwrap();
        std::fs::write(&temps, r#"[{"day":"2026-01-03","mean_temp":0},{"day":"2026-01-02","mean_temp":0}]"#)
            .unwrap();
        let err = build_forecast(&store, TankId(1), &temps, 70.0, &env_file)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No coefficients"));

        // 20 units per day at 0 °C
        write_coefficients(&env_file, &report(0.0, -1.0)).unwrap();
        let fc = build_forecast(&store, TankId(1), &temps, 70.0, &env_file)
            .await
            .unwrap();
        assert_eq!(fc.start_level, 100.0);
        assert_eq!(fc.days[0].day, date(2));
        assert_eq!(fc.warning_day, Some(date(3)));

        let err = build_forecast(&store, TankId(2), &temps, 70.0, &env_file)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No level readings"));
    }

    #[test]
    fn regression_summary_mentions_fit() {
        let report = report(-0.2, -1.0);
        let text = RegressionSummary(&report).to_string();
        assert!(text.contains("Period: all data"));
        assert!(text.contains("Rate = -0.2000 * T + -1.0000"));
        assert!(text.contains("well suited"));
        assert!(text.contains("Too few samples"));
    }

    #[test]
    fn forecast_summary_reports_warning_day() {
        // 20 units per day at 0 °C
        let model = ConsumptionModel::new(0.0, -1.0);
        let fc = project_level(&model, 100.0, &[(date(1), 0.0), (date(2), 0.0)], 70.0).unwrap();
        let text = ForecastSummary(&fc).to_string();
        assert!(text.contains("reached on 2026-01-02"));
    }
}
