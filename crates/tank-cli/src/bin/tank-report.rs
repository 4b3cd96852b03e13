//! Offline consumption analysis and raw data export.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tank_analysis::ConsumptionAnalyzer;
use tank_cli::report::{build_forecast, ForecastSummary, RegressionSummary};
use tank_config::AppConfig;
use tank_core::{MeasurementStore, TankId, TimeRange};
use tank_db::DbClient;
use tank_export::{export_range, write_coefficients, JsonlSink};

/// tank-report: heating oil consumption analysis.
#[derive(Parser)]
#[command(name = "tank-report", version, about)]
struct Cli {
    /// Database URL (overrides the config file).
    #[arg(long, global = true)]
    database: Option<String>,

    /// Tank id (overrides the config file).
    #[arg(long, global = true)]
    tank: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show stored series spans and readings per channel.
    Info,

    /// Fit consumption against outside temperature.
    Analyze {
        /// First day, YYYY-MM-DD.
        from: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD.
        to: Option<NaiveDate>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Store REGRESSION_K / REGRESSION_C in this env file.
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Write raw level and temperature rows as JSON lines.
    Export {
        /// First day, YYYY-MM-DD.
        from: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD.
        to: Option<NaiveDate>,

        /// Output file.
        #[arg(long)]
        out: PathBuf,
    },

    /// Project the tank level over a temperature forecast.
    Forecast {
        /// JSON array of {"day": "YYYY-MM-DD", "mean_temp": <°C>}.
        temps: PathBuf,

        /// Warning level (overrides the config file).
        #[arg(long)]
        warning: Option<f64>,

        /// Env file holding REGRESSION_K / REGRESSION_C.
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tank_obs::init_stderr("tank-report");

    let cli = Cli::parse();
    let cfg = AppConfig::load().context("Failed to load configuration")?;
    let tank = TankId(cli.tank.unwrap_or_else(|| cfg.tank_id()));
    let database_url = cli.database.clone().unwrap_or_else(|| cfg.database_url());

    let db = DbClient::new(&database_url)
        .await
        .with_context(|| format!("Failed to open database {database_url}"))?;
    let store: Arc<dyn MeasurementStore> = Arc::new(db.clone());

    let result = match cli.command {
        Commands::Info => cmd_info(&db, tank).await,
        Commands::Analyze {
            from,
            to,
            json,
            env_file,
        } => cmd_analyze(store, tank, range(from, to)?, json, env_file).await,
        Commands::Export { from, to, out } => {
            cmd_export(store.as_ref(), tank, range(from, to)?, out).await
        }
        Commands::Forecast {
            temps,
            warning,
            env_file,
        } => {
            let warning = warning.or_else(|| cfg.warning_level()).unwrap_or(0.0);
            let env_file = env_file.unwrap_or_else(|| cfg.env_file());
            cmd_forecast(store.as_ref(), tank, temps, warning, env_file).await
        }
    };

    db.close().await;
    result
}

/// Implements `tank-report info`.
async fn cmd_info(db: &DbClient, tank: TankId) -> Result<()> {
    let (level, temp) = db.series_span(tank).await?;
    println!("Tank {tank}");
    for (name, span) in [("level", level), ("temperature", temp)] {
        match span {
            Some(span) => println!("  {name:<12} {} .. {}", span.first, span.last),
            None => println!("  {name:<12} no readings"),
        }
    }
    for (channel, count) in db.count_by_channel(tank).await? {
        println!("  {channel:<12} {count} readings");
    }
    Ok(())
}

fn range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<TimeRange> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            bail!("FROM {from} is after TO {to}");
        }
    }
    Ok(TimeRange::from_dates(from, to))
}

/// Implements `tank-report analyze [FROM [TO]]`.
async fn cmd_analyze(
    store: Arc<dyn MeasurementStore>,
    tank: TankId,
    range: TimeRange,
    json: bool,
    env_file: Option<PathBuf>,
) -> Result<()> {
    let report = ConsumptionAnalyzer::new(store)
        .analyze(tank, range)
        .await
        .context("Analysis failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", RegressionSummary(&report));
    }

    if let Some(path) = env_file {
        write_coefficients(&path, &report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Coefficients written to {}", path.display());
    }
    Ok(())
}

/// Implements `tank-report export [FROM [TO]] --out FILE`.
async fn cmd_export(
    store: &dyn MeasurementStore,
    tank: TankId,
    range: TimeRange,
    out: PathBuf,
) -> Result<()> {
    let mut sink = JsonlSink::new(&out)
        .with_context(|| format!("Failed to open {}", out.display()))?;
    let summary = export_range(store, tank, range, &mut sink).await?;
    sink.flush()?;
    println!(
        "Exported {} level and {} temperature rows to {}",
        summary.levels,
        summary.temps,
        out.display()
    );
    Ok(())
}

/// Implements `tank-report forecast TEMPS`.
async fn cmd_forecast(
    store: &dyn MeasurementStore,
    tank: TankId,
    temps: PathBuf,
    warning: f64,
    env_file: PathBuf,
) -> Result<()> {
    let forecast = build_forecast(store, tank, &temps, warning, &env_file).await?;
    print!("{}", ForecastSummary(&forecast));
    Ok(())
}
