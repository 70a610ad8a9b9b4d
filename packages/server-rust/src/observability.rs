//! Logging and metrics bootstrap.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, multi-line.
    Pretty,
}

const DEFAULT_DIRECTIVES: &str = "info,eventboard_server=debug,tower_http=info";

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the default directives.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))
}

/// Starts the Prometheus scrape endpoint on `addr` and registers it as the
/// global metrics recorder.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Fails if the listener cannot be bound or a recorder is already installed.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    info!(%addr, "prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(
        "eventboard_request_failures_total",
        "Classified request failures by error kind"
    );
    metrics::describe_counter!(
        "eventboard_unhandled_faults_total",
        "Failures that fell through to UnknownError"
    );
    metrics::describe_counter!(
        "eventboard_admission_rejected_total",
        "Mutations refused because a capacity cap was reached"
    );
}
