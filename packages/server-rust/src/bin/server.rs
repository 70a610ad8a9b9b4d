//! Event board server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eventboard_server::auth::JwtIdentityProvider;
use eventboard_server::network::{NetworkConfig, NetworkModule, TlsConfig};
use eventboard_server::observability::{init_metrics, init_tracing, LogFormat};
use eventboard_server::service::{Environment, ResourceService, ServiceConfig};
use eventboard_server::storage::MemoryDataStore;
use eventboard_server::DataStore;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "eventboard-server")]
#[command(about = "HTTP API for listing, saving, and managing events", long_about = None)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "EVENTBOARD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port.
    #[arg(long, env = "EVENTBOARD_PORT", default_value_t = 3000)]
    port: u16,

    /// PEM certificate chain; enables TLS together with `--tls-key`.
    #[arg(long, env = "EVENTBOARD_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long, env = "EVENTBOARD_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Allowed CORS origins, comma separated.
    #[arg(long, env = "EVENTBOARD_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "EVENTBOARD_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// HMAC secret used to verify bearer tokens.
    #[arg(long, env = "EVENTBOARD_JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Deployment environment; controls fault detail in error responses.
    #[arg(
        long,
        env = "EVENTBOARD_ENVIRONMENT",
        value_enum,
        default_value_t = Environment::Production
    )]
    environment: Environment,

    /// Soft cap on stored events.
    #[arg(long, env = "EVENTBOARD_MAX_RESOURCES", default_value_t = 50_000)]
    max_resources: u64,

    /// Soft cap on saved-event bookmarks.
    #[arg(long, env = "EVENTBOARD_MAX_SAVED", default_value_t = 100_000)]
    max_saved_relations: u64,

    /// Log output format.
    #[arg(long, env = "EVENTBOARD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Address for the Prometheus scrape endpoint. Disabled when unset.
    #[arg(long, env = "EVENTBOARD_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

impl Cli {
    fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }

    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            environment: self.environment,
            max_saved_relations: self.max_saved_relations,
            max_resources: self.max_resources,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;
    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)?;
    }

    let store = Arc::new(MemoryDataStore::new());
    store.connect().await?;

    let service = ResourceService::new(store.clone(), cli.service_config());
    let identity = Arc::new(JwtIdentityProvider::from_secret(cli.jwt_secret.as_bytes()));

    let mut network = NetworkModule::new(cli.network_config());
    let port = network.start().await?;
    info!(port, environment = ?cli.environment, "eventboard server starting");

    let state = network.app_state(service, identity);
    let served = network.serve(state, shutdown_signal()).await;

    if let Err(err) = store.disconnect().await {
        warn!(error = %err, "data store disconnect failed");
    }
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; shutting down");
    }
    info!("shutdown signal received");
}
