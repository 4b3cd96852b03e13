//! Regression coefficients in a dotenv-style file
//!
//! `tank-report analyze --env-file` stores the fitted model as
//! `REGRESSION_K` / `REGRESSION_C`, replacing earlier values and keeping
//! every other line of the file.

use crate::{ExportError, ExportResult};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tank_analysis::{ConsumptionModel, RegressionReport};

pub const SLOPE_KEY: &str = "REGRESSION_K";
pub const INTERCEPT_KEY: &str = "REGRESSION_C";

const HEADER: &str = "# Consumption rate = REGRESSION_K * T + REGRESSION_C, level drop = rate * (T - 20)";
const FIT_PREFIX: &str = "# R2 = ";

fn is_managed(line: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);
    line.starts_with(SLOPE_KEY)
        || line.starts_with(INTERCEPT_KEY)
        || line.starts_with(FIT_PREFIX)
        || line == HEADER
}

/// Write the report's model into `path`, creating the file if needed
pub fn write_coefficients<P: AsRef<Path>>(path: P, report: &RegressionReport) -> ExportResult<()> {
    let path = path.as_ref();
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut out: String = existing
        .lines()
        .filter(|line| !is_managed(line))
        .map(|line| format!("{line}\n"))
        .collect();
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }

    out.push_str(HEADER);
    out.push('\n');
    out.push_str(&format!("{FIT_PREFIX}{:.6}\n", report.r_squared));
    out.push_str(&format!("{SLOPE_KEY}={:.6}\n", report.slope));
    out.push_str(&format!("{INTERCEPT_KEY}={:.6}\n", report.intercept));

    fs::write(path, out)?;
    tracing::info!("Wrote regression coefficients to {}", path.display());
    Ok(())
}

/// Read the model back; `None` when the file lacks either key
///
/// Parsing follows dotenv syntax, so quoted values and `export` prefixes
/// are accepted.
pub fn read_coefficients<P: AsRef<Path>>(path: P) -> ExportResult<Option<ConsumptionModel>> {
    let mut slope = None;
    let mut intercept = None;
    for item in dotenvy::from_path_iter(path.as_ref())? {
        let (key, value) = item?;
        let target = match key.as_str() {
            SLOPE_KEY => &mut slope,
            INTERCEPT_KEY => &mut intercept,
            _ => continue,
        };
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| ExportError::InvalidCoefficients(format!("{key}: {value:?}")))?;
        *target = Some(parsed);
    }

    Ok(slope.zip(intercept).map(|(k, c)| ConsumptionModel::new(k, c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_analysis::FitQuality;
    use tank_core::TankId;

    fn report(slope: f64, intercept: f64) -> RegressionReport {
        RegressionReport {
            tank: TankId(1),
            from: None,
            to: None,
            slope,
            intercept,
            r_squared: 0.81,
            r: -0.9,
            std_err: Some(0.01),
            p_value: Some(0.001),
            sample_count: 12,
            quality: FitQuality::assess(0.81, Some(0.001)),
            samples: Vec::new(),
        }
    }

    #[test]
    fn writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        write_coefficients(&path, &report(-0.2, -1.0)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("REGRESSION_K=-0.200000"));
        assert!(content.contains("REGRESSION_C=-1.000000"));
        assert_eq!(
            read_coefficients(&path).unwrap(),
            Some(ConsumptionModel::new(-0.2, -1.0))
        );
    }

    #[test]
    fn replaces_old_values_and_keeps_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "MQTT_URL=mqtt://broker\nREGRESSION_K=9\nREGRESSION_C=9\n").unwrap();

        write_coefficients(&path, &report(-0.5, 2.0)).unwrap();
        write_coefficients(&path, &report(-0.25, 1.5)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("MQTT_URL=mqtt://broker\n"));
        assert_eq!(content.matches("REGRESSION_K=").count(), 1);
        assert_eq!(content.matches(HEADER).count(), 1);
        assert_eq!(content.matches(FIT_PREFIX).count(), 1);
        assert_eq!(
            read_coefficients(&path).unwrap(),
            Some(ConsumptionModel::new(-0.25, 1.5))
        );
    }

    #[test]
    fn missing_key_and_bad_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        fs::write(&path, "REGRESSION_K=0.1\n").unwrap();
        assert_eq!(read_coefficients(&path).unwrap(), None);

        fs::write(&path, "REGRESSION_K=abc\nREGRESSION_C=1\n").unwrap();
        assert!(matches!(
            read_coefficients(&path),
            Err(ExportError::InvalidCoefficients(_))
        ));

        assert!(matches!(
            read_coefficients(dir.path().join("missing.env")),
            Err(ExportError::Io(_))
        ));

        fs::write(&path, "REGRESSION_K='-0.2\nREGRESSION_C=1\n").unwrap();
        assert!(matches!(
            read_coefficients(&path),
            Err(ExportError::Dotenv(_))
        ));
    }

    #[test]
    fn reads_quoted_and_exported_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# fitted by hand\nexport REGRESSION_K=-0.2\nREGRESSION_C=\"-1.0\"\n",
        )
        .unwrap();

        assert_eq!(
            read_coefficients(&path).unwrap(),
            Some(ConsumptionModel::new(-0.2, -1.0))
        );

        write_coefficients(&path, &report(-0.3, 0.5)).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("export REGRESSION_K"));
        assert!(content.starts_with("# fitted by hand\n"));
        assert_eq!(
            read_coefficients(&path).unwrap(),
            Some(ConsumptionModel::new(-0.3, 0.5))
        );
    }
}
