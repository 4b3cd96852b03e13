use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "TANKMON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankConfig {
    pub id: Option<u32>,
    /// Level below which the forecast reports a warning day
    pub warning_level: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub daily_days: Option<i64>,
    pub hourly_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub tank: Option<TankConfig>,
    pub database: Option<DatabaseConfig>,
    pub http: Option<HttpConfig>,
    pub aggregation: Option<AggregationConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Load configuration from TANKMON_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    /// Defaults when `path` does not exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> ConfigResult<Self> {
        let cfg = toml::from_str::<AppConfig>(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> ConfigResult<()> {
        if let Some(agg) = &self.aggregation {
            for (field, days) in [
                ("aggregation.daily_days", agg.daily_days),
                ("aggregation.hourly_days", agg.hourly_days),
            ] {
                if matches!(days, Some(d) if d < 1) {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: "must be at least 1".to_string(),
                    });
                }
            }
        }
        if let Some(level) = self.tank.as_ref().and_then(|t| t.warning_level) {
            if !level.is_finite() || level < 0.0 {
                return Err(ConfigError::Invalid {
                    field: "tank.warning_level",
                    reason: format!("{level} is not a level"),
                });
            }
        }
        Ok(())
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.http
            .as_ref()
            .and_then(|h| h.bind.clone())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
    }

    /// SQLite URL (default `sqlite://tank.db`)
    pub fn database_url(&self) -> String {
        self.database
            .as_ref()
            .and_then(|d| d.url.clone())
            .unwrap_or_else(|| "sqlite://tank.db".to_string())
    }

    pub fn tank_id(&self) -> u32 {
        self.tank.as_ref().and_then(|t| t.id).unwrap_or(1)
    }

    pub fn warning_level(&self) -> Option<f64> {
        self.tank.as_ref().and_then(|t| t.warning_level)
    }

    pub fn daily_days(&self) -> i64 {
        self.aggregation
            .as_ref()
            .and_then(|a| a.daily_days)
            .unwrap_or(30)
    }

    pub fn hourly_days(&self) -> i64 {
        self.aggregation
            .as_ref()
            .and_then(|a| a.hourly_days)
            .unwrap_or(7)
    }

    pub fn env_file(&self) -> PathBuf {
        self.report
            .as_ref()
            .and_then(|r| r.env_file.clone())
            .unwrap_or_else(|| PathBuf::from(".env"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_bind(), "0.0.0.0:8080");
        assert_eq!(cfg.database_url(), "sqlite://tank.db");
        assert_eq!(cfg.tank_id(), 1);
        assert_eq!(cfg.daily_days(), 30);
        assert_eq!(cfg.hourly_days(), 7);
        assert_eq!(cfg.warning_level(), None);
        assert_eq!(cfg.env_file(), PathBuf::from(".env"));
    }

    #[test]
    fn parses_sections() {
        let cfg = AppConfig::parse(
            r#"
            [tank]
            id = 3
            warning_level = 250.0

            [http]
            bind = "127.0.0.1:9000"

            [aggregation]
            hourly_days = 2
            "#,
        )
        .unwrap();

        assert_eq!(cfg.tank_id(), 3);
        assert_eq!(cfg.warning_level(), Some(250.0));
        assert_eq!(cfg.http_bind(), "127.0.0.1:9000");
        assert_eq!(cfg.hourly_days(), 2);
        assert_eq!(cfg.daily_days(), 30);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::parse("[aggregation]\ndaily_days = 0\n"),
            Err(ConfigError::Invalid { field: "aggregation.daily_days", .. })
        ));
        assert!(matches!(
            AppConfig::parse("[tank]\nwarning_level = -1.0\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            AppConfig::parse("[tank]\nid = \"one\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.tank_id(), 1);

        let path = dir.path().join("config.toml");
        fs::write(&path, "[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.database_url(), "sqlite::memory:");
    }
}
