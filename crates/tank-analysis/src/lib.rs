//! Consumption-vs-temperature regression
//!
//! Daily level drops are normalized by the distance of the day's mean
//! outside temperature to 20 °C and regressed against that temperature.
//! Every run reads the store from scratch; nothing is cached.

pub mod consumption;
pub mod forecast;
pub mod regression;
pub mod stats;

pub use consumption::*;
pub use forecast::*;
pub use regression::*;

use std::sync::Arc;
use tank_core::{Channel, MeasurementStore, StoreError, TankId, TimeRange};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Fewer than two samples, or all samples at the same temperature
    #[error("Insufficient data: {samples} usable samples")]
    InsufficientData { samples: usize },

    #[error("Degenerate model: {0}")]
    DegenerateModel(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Runs the regression over a store
#[derive(Clone)]
pub struct ConsumptionAnalyzer {
    store: Arc<dyn MeasurementStore>,
}

impl ConsumptionAnalyzer {
    pub fn new(store: Arc<dyn MeasurementStore>) -> Self {
        Self { store }
    }

    /// Daily samples for a range without fitting
    pub async fn samples(
        &self,
        tank: TankId,
        range: TimeRange,
    ) -> AnalysisResult<Vec<ConsumptionSample>> {
        let levels = self.store.read_level_range(tank, range).await?;
        let outside = self
            .store
            .read_temp_range(tank, Some(Channel::Outside), range)
            .await?;

        let inputs = daily_inputs(&levels, &outside);
        debug!(
            "{} days from {} level and {} outside readings",
            inputs.len(),
            levels.len(),
            outside.len()
        );
        Ok(consumption_samples(&inputs))
    }

    /// Fit the consumption model over `range`
    #[instrument(skip(self))]
    pub async fn analyze(&self, tank: TankId, range: TimeRange) -> AnalysisResult<RegressionReport> {
        let samples = self.samples(tank, range).await?;
        let points: Vec<(f64, f64)> = samples.iter().map(|s| (s.mean_temp, s.rate)).collect();
        let fit = fit_line(&points)?;

        info!(
            "Fitted {} samples: slope={:.4} intercept={:.4} r2={:.3}",
            samples.len(),
            fit.slope,
            fit.intercept,
            fit.r_squared
        );
        Ok(RegressionReport::new(tank, range.from, range.to, fit, samples))
    }
}
