//! Ordinary least squares fit of consumption rate against outside temperature

use crate::stats::student_t_two_sided;
use crate::{AnalysisError, AnalysisResult, ConsumptionSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tank_core::{TankId, REFERENCE_TEMP_C};

/// R² above which a fit is considered good
pub const GOOD_FIT_R2: f64 = 0.7;
/// R² above which a fit is considered acceptable
pub const ACCEPTABLE_FIT_R2: f64 = 0.5;
/// Significance level of the slope t-test
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Straight line `y = slope * x + intercept` with fit statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Correlation coefficient, signed like the slope
    pub r: f64,
    /// Standard error of the slope, `None` without residual degrees of freedom
    pub std_err: Option<f64>,
    /// Two-sided p-value of the slope, `None` without residual degrees of freedom
    pub p_value: Option<f64>,
    pub n: usize,
}

/// Least squares fit over `(x, y)` points.
///
/// Needs two points with distinct `x`. With exactly two points the line is
/// exact: R² is 1 and the p-value is undefined.
pub fn fit_line(points: &[(f64, f64)]) -> AnalysisResult<LinearFit> {
    let n = points.len();
    if n < 2 {
        return Err(AnalysisError::InsufficientData { samples: n });
    }

    let nf = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        return Err(AnalysisError::InsufficientData { samples: n });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(AnalysisError::DegenerateModel(format!(
            "slope {slope}, intercept {intercept}"
        )));
    }

    // a perfectly flat y is still an exact fit
    let r_squared = if n == 2 || syy == 0.0 {
        1.0
    } else {
        (sxy * sxy / (sxx * syy)).min(1.0)
    };
    let r = if slope == 0.0 {
        0.0
    } else {
        r_squared.sqrt().copysign(slope)
    };

    let df = n - 2;
    let (std_err, p_value) = if df == 0 {
        (None, None)
    } else {
        let sse = (syy - slope * sxy).max(0.0);
        let std_err = (sse / df as f64 / sxx).sqrt();
        let p_value = if std_err > 0.0 {
            Some(student_t_two_sided(slope / std_err, df as f64))
        } else if slope != 0.0 {
            Some(0.0)
        } else {
            None
        };
        (Some(std_err), p_value)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        r,
        std_err,
        p_value,
        n,
    })
}

/// How well the line describes the samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goodness {
    Good,
    Acceptable,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitQuality {
    pub goodness: Goodness,
    /// Whether the slope is significant at 5 %; `None` when untestable
    pub significant: Option<bool>,
}

impl FitQuality {
    pub fn assess(r_squared: f64, p_value: Option<f64>) -> Self {
        let goodness = if r_squared > GOOD_FIT_R2 {
            Goodness::Good
        } else if r_squared > ACCEPTABLE_FIT_R2 {
            Goodness::Acceptable
        } else {
            Goodness::Poor
        };
        Self {
            goodness,
            significant: p_value.map(|p| p < SIGNIFICANCE_LEVEL),
        }
    }
}

/// Fitted consumption model `rate(T) = slope * T + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionModel {
    pub slope: f64,
    pub intercept: f64,
}

impl ConsumptionModel {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Consumption rate per °C of difference to the reference temperature
    pub fn rate(&self, temp: f64) -> f64 {
        self.slope * temp + self.intercept
    }

    /// Expected level drop over one day at mean temperature `temp`
    pub fn daily_drop(&self, temp: f64) -> f64 {
        self.rate(temp) * (temp - REFERENCE_TEMP_C)
    }
}

/// Result of a consumption analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub tank: TankId,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub r: f64,
    pub std_err: Option<f64>,
    pub p_value: Option<f64>,
    pub sample_count: usize,
    pub quality: FitQuality,
    pub samples: Vec<ConsumptionSample>,
}

impl RegressionReport {
    pub(crate) fn new(
        tank: TankId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        fit: LinearFit,
        samples: Vec<ConsumptionSample>,
    ) -> Self {
        Self {
            tank,
            from,
            to,
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            r: fit.r,
            std_err: fit.std_err,
            p_value: fit.p_value,
            sample_count: samples.len(),
            quality: FitQuality::assess(fit.r_squared, fit.p_value),
            samples,
        }
    }

    /// Predicted consumption rate at `temp`
    pub fn predict(&self, temp: f64) -> f64 {
        self.model().rate(temp)
    }

    pub fn model(&self) -> ConsumptionModel {
        ConsumptionModel::new(self.slope, self.intercept)
    }
}
