pub mod coefficients;

pub use coefficients::*;

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tank_core::{
    Measurement, MeasurementSink, MeasurementStore, StoreError, TankId, TimeRange,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid coefficients file: {0}")]
    InvalidCoefficients(String),

    #[error("Malformed env file: {0}")]
    Dotenv(dotenvy::Error),
}

impl From<dotenvy::Error> for ExportError {
    fn from(e: dotenvy::Error) -> Self {
        match e {
            dotenvy::Error::Io(e) => ExportError::Io(e),
            other => ExportError::Dotenv(other),
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Appends measurements as JSON lines
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> ExportResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MeasurementSink for JsonlSink {
    type Error = ExportError;

    async fn emit(&mut self, measurement: &Measurement) -> ExportResult<()> {
        let line = serde_json::to_string(measurement)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Number of rows written per series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub levels: usize,
    pub temps: usize,
}

/// Stored rows of one tank merged into timestamp order
///
/// On equal timestamps level rows come before temperature rows.
pub async fn read_raw(
    store: &dyn MeasurementStore,
    tank: TankId,
    range: TimeRange,
) -> ExportResult<Vec<Measurement>> {
    let levels = store.read_level_range(tank, range).await?;
    let temps = store.read_temp_range(tank, None, range).await?;

    let mut rows: Vec<Measurement> = levels
        .into_iter()
        .map(Measurement::Level)
        .chain(temps.into_iter().map(Measurement::Temp))
        .collect();
    // stable: keeps store order within each series
    rows.sort_by_key(Measurement::timestamp);
    Ok(rows)
}

/// Copy raw rows from the store into a sink
pub async fn export_range<S>(
    store: &dyn MeasurementStore,
    tank: TankId,
    range: TimeRange,
    sink: &mut S,
) -> ExportResult<ExportSummary>
where
    S: MeasurementSink + ?Sized,
    ExportError: From<S::Error>,
{
    let mut summary = ExportSummary::default();
    for m in read_raw(store, tank, range).await? {
        sink.emit(&m).await?;
        match m {
            Measurement::Level(_) => summary.levels += 1,
            Measurement::Temp(_) => summary.temps += 1,
        }
    }

    info!(
        "Exported {} level and {} temperature rows for tank {}",
        summary.levels, summary.temps, tank
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tank_core::{Channel, LevelMeasurement, MemoryStore, TempMeasurement};

    #[tokio::test]
    async fn writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("raw.jsonl");
        let mut sink = JsonlSink::new(&path).unwrap();

        let ts = Utc.with_ymd_and_hms(2025, 12, 4, 13, 1, 18).unwrap();
        let m = Measurement::Temp(TempMeasurement::new(ts, TankId(1), Channel::Outside, 20.1));
        sink.emit(&m).await.unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let back: Measurement = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(back, m);
    }

    #[tokio::test]
    async fn exports_merged_series() {
        let store = MemoryStore::new();
        let t = |h| Utc.with_ymd_and_hms(2025, 12, 4, h, 0, 0).unwrap();
        store
            .append_temp(&TempMeasurement::new(t(9), TankId(1), Channel::Outside, 1.0))
            .await
            .unwrap();
        store
            .append_level(&LevelMeasurement::new(t(8), TankId(1), [Some(700.0), None, Some(702.0)]))
            .await
            .unwrap();
        store
            .append_temp(&TempMeasurement::new(t(10), TankId(2), Channel::Outside, 1.0))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::new(dir.path().join("raw.jsonl")).unwrap();
        let summary = export_range(&store, TankId(1), TimeRange::all(), &mut sink)
            .await
            .unwrap();
        sink.flush().unwrap();

        assert_eq!(summary, ExportSummary { levels: 1, temps: 1 });
        let content = std::fs::read_to_string(sink.path()).unwrap();
        let kinds: Vec<&str> = content
            .lines()
            .map(|l| if l.contains("\"kind\":\"level\"") { "level" } else { "temp" })
            .collect();
        assert_eq!(kinds, vec!["level", "temp"]);
    }

    #[tokio::test]
    async fn export_surfaces_store_failure() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::new(dir.path().join("raw.jsonl")).unwrap();

        let err = export_range(&store, TankId(1), TimeRange::all(), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Store(_)));
    }
}
