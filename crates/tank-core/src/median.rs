//! Median of the redundant level sensors

/// Median of up to three valid readings.
///
/// Two values yield their midpoint, an empty slice yields `None` so
/// callers omit the row instead of inventing a zero level.
pub fn median_of_valid(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Whether a raw level reading can take part in the median.
///
/// The ultrasonic sensors report zero or negative distances on echo loss.
pub fn is_valid_level_reading(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
