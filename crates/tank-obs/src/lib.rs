use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "info,tank=debug";

/// Filter directives from `RUST_LOG`, or [`DEFAULT_FILTER`]
pub fn filter_directives() -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install JSON logging for a binary.
/// - RUST_LOG respected; default to "info,tank=debug"
/// - calling it twice keeps the first subscriber
pub fn init(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directives()))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Observability initialized");
    }
}

/// Same as [`init`] but logs to stderr, keeping stdout for command output
pub fn init_stderr(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directives()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %service_name, "Observability initialized");
    }
}
