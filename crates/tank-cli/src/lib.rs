pub mod report;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use tank_aggregate::{AggregateError, Aggregated, AggregationEngine, DailyRow, HourlyRow};
use tank_analysis::{AnalysisError, ConsumptionAnalyzer, RegressionReport};
use tank_config::AppConfig;
use tank_core::{
    AggregationWindow, Granularity, Measurement, MeasurementStore, TankId, TimeRange,
};
use tank_export::ExportError;
use thiserror::Error;

/// Default trailing windows of the aggregation endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSettings {
    pub daily_days: i64,
    pub hourly_days: i64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            daily_days: 30,
            hourly_days: 7,
        }
    }
}

impl From<&AppConfig> for ApiSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            daily_days: cfg.daily_days(),
            hourly_days: cfg.hourly_days(),
        }
    }
}

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    settings: ApiSettings,
    store: Arc<dyn MeasurementStore>,
    aggregation: AggregationEngine,
    analyzer: ConsumptionAnalyzer,
}

impl AppState {
    fn count(&self, route: &'static str) {
        self.requests_total.add(1, &[KeyValue::new("route", route)]);
    }
}

pub fn build_app(
    store: Arc<dyn MeasurementStore>,
    settings: ApiSettings,
) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter().with_registry(registry.clone()).build()?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("tank-cli");

    let requests_total = meter
        .u64_counter("tank_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        settings,
        aggregation: AggregationEngine::new(Arc::clone(&store)),
        analyzer: ConsumptionAnalyzer::new(Arc::clone(&store)),
        store,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/tanks/:id/daily", get(daily))
        .route("/api/v1/tanks/:id/hourly", get(hourly))
        .route("/api/v1/tanks/:id/analysis", get(analysis))
        .route("/api/v1/tanks/:id/export", get(export))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

/// Error body is `{"error": <code>, "message": <text>}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No data for tank {0}")]
    NoData(TankId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    InsufficientData(String),

    #[error("{0}")]
    DegenerateModel(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NoData(_) => "no_data",
            ApiError::StoreUnavailable(_) => "store_unavailable",
            ApiError::InsufficientData(_) => "insufficient_data",
            ApiError::DegenerateModel(_) => "degenerate_model",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoData(_) => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InsufficientData(_) | ApiError::DegenerateModel(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<AggregateError> for ApiError {
    fn from(e: AggregateError) -> Self {
        match e {
            AggregateError::NoData { tank } => ApiError::NoData(tank),
            AggregateError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::InsufficientData { .. } => ApiError::InsufficientData(e.to_string()),
            AnalysisError::DegenerateModel(_) => ApiError::DegenerateModel(e.to_string()),
            AnalysisError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.count("healthz");
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

#[derive(Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct RangeQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl RangeQuery {
    fn range(&self) -> Result<TimeRange, ApiError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(ApiError::BadRequest(format!("from {from} is after to {to}")));
            }
        }
        Ok(TimeRange::from_dates(self.from, self.to))
    }
}

fn trailing_window(
    days: Option<i64>,
    default_days: i64,
    granularity: Granularity,
) -> Result<AggregationWindow, ApiError> {
    let days = days.unwrap_or(default_days);
    if days < 1 {
        return Err(ApiError::BadRequest(format!("days must be at least 1, got {days}")));
    }
    AggregationWindow::last_days(Utc::now(), days, granularity)
        .ok_or_else(|| ApiError::BadRequest(format!("days {days} is out of range")))
}

async fn daily(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Aggregated<DailyRow>>, ApiError> {
    state.count("daily");
    let window = trailing_window(q.days, state.settings.daily_days, Granularity::Daily)?;
    let result = state.aggregation.daily_min_max(TankId(id), window).await?;
    Ok(Json(result))
}

async fn hourly(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(q): Query<DaysQuery>,
) -> Result<Json<Aggregated<HourlyRow>>, ApiError> {
    state.count("hourly");
    let window = trailing_window(q.days, state.settings.hourly_days, Granularity::Hourly)?;
    let result = state.aggregation.hourly_bucket(TankId(id), window).await?;
    Ok(Json(result))
}

async fn analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<RegressionReport>, ApiError> {
    state.count("analysis");
    let report = state.analyzer.analyze(TankId(id), q.range()?).await?;
    Ok(Json(report))
}

async fn export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<Vec<Measurement>>, ApiError> {
    state.count("export");
    let rows = tank_export::read_raw(state.store.as_ref(), TankId(id), q.range()?).await?;
    Ok(Json(rows))
}
