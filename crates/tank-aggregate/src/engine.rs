//! On-demand windowed aggregation with a two-phase fallback

use crate::{daily_rows, hourly_rows, AggregateError, AggregateResult, DailyRow, HourlyRow};
use serde::Serialize;
use std::sync::Arc;
use tank_core::{
    AggregationWindow, Granularity, LevelMeasurement, MeasurementStore, TankId, TempMeasurement,
};
use tracing::{debug, info, instrument};

/// Which query produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPhase {
    /// The requested window had data
    Primary,
    /// The requested window was empty; the window was moved to end at the
    /// latest stored reading
    Fallback,
}

/// Aggregation rows plus the window that produced them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregated<T> {
    pub rows: Vec<T>,
    pub window: AggregationWindow,
    pub phase: QueryPhase,
}

impl<T> Aggregated<T> {
    pub fn fallback_used(&self) -> bool {
        self.phase == QueryPhase::Fallback
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of [`AggregationEngine::aggregate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "granularity", rename_all = "lowercase")]
pub enum Aggregation {
    Daily(Aggregated<DailyRow>),
    Hourly(Aggregated<HourlyRow>),
}

impl Aggregation {
    pub fn phase(&self) -> QueryPhase {
        match self {
            Aggregation::Daily(a) => a.phase,
            Aggregation::Hourly(a) => a.phase,
        }
    }
}

struct Fetched {
    levels: Vec<LevelMeasurement>,
    temps: Vec<TempMeasurement>,
    window: AggregationWindow,
    phase: QueryPhase,
}

/// Read-only aggregation over a measurement store
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn MeasurementStore>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self { store }
    }

    /// Daily min/max per temperature channel plus the end-of-day level
    #[instrument(skip(self))]
    pub async fn daily_min_max(
        &self,
        tank: TankId,
        window: AggregationWindow,
    ) -> AggregateResult<Aggregated<DailyRow>> {
        let fetched = self.fetch_with_fallback(tank, window).await?;
        Ok(Aggregated {
            rows: daily_rows(&fetched.levels, &fetched.temps),
            window: fetched.window,
            phase: fetched.phase,
        })
    }

    /// Last value per channel and hour, with the level of the hour's last reading
    #[instrument(skip(self))]
    pub async fn hourly_bucket(
        &self,
        tank: TankId,
        window: AggregationWindow,
    ) -> AggregateResult<Aggregated<HourlyRow>> {
        let fetched = self.fetch_with_fallback(tank, window).await?;
        Ok(Aggregated {
            rows: hourly_rows(&fetched.levels, &fetched.temps),
            window: fetched.window,
            phase: fetched.phase,
        })
    }

    /// Dispatch on the window's granularity
    pub async fn aggregate(
        &self,
        tank: TankId,
        window: AggregationWindow,
    ) -> AggregateResult<Aggregation> {
        Ok(match window.granularity {
            Granularity::Daily => Aggregation::Daily(self.daily_min_max(tank, window).await?),
            Granularity::Hourly => Aggregation::Hourly(self.hourly_bucket(tank, window).await?),
        })
    }

    async fn fetch(
        &self,
        tank: TankId,
        window: &AggregationWindow,
    ) -> AggregateResult<(Vec<LevelMeasurement>, Vec<TempMeasurement>)> {
        let range = window.range();
        let levels = if window.selector.includes_level() {
            self.store.read_level_range(tank, range).await?
        } else {
            Vec::new()
        };
        let temps = if window.selector.includes_temps() {
            self.store
                .read_temp_range(tank, window.selector.temp_filter(), range)
                .await?
        } else {
            Vec::new()
        };
        Ok((levels, temps))
    }

    /// Both phases read whole buckets, so the first day or hour of a window
    /// is never reported from a partial range
    async fn fetch_with_fallback(
        &self,
        tank: TankId,
        requested: AggregationWindow,
    ) -> AggregateResult<Fetched> {
        let window = requested.snapped();
        let (levels, temps) = self.fetch(tank, &window).await?;
        if !levels.is_empty() || !temps.is_empty() {
            debug!(
                "Primary window has {} level and {} temperature rows",
                levels.len(),
                temps.len()
            );
            return Ok(Fetched {
                levels,
                temps,
                window,
                phase: QueryPhase::Primary,
            });
        }

        let latest = self
            .store
            .latest_timestamp(tank)
            .await?
            .ok_or(AggregateError::NoData { tank })?;

        let shifted = requested.shifted_to_end(latest).snapped();
        info!(
            "Window {} .. {} is empty for tank {}, falling back to {} .. {}",
            window.start, window.end, tank, shifted.start, shifted.end
        );

        let (levels, temps) = self.fetch(tank, &shifted).await?;
        Ok(Fetched {
            levels,
            temps,
            window: shifted,
            phase: QueryPhase::Fallback,
        })
    }
}
