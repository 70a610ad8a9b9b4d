//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until shutdown. The bootstrap can wire the
//! data store and identity provider between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{health_handler, liveness_handler, readiness_handler, resources, AppState};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::ResourceService;
use crate::traits::IdentityProvider;

/// Assembles the full router for `state`.
///
/// Routes:
/// - `GET /health`, `GET /health/live`, `GET /health/ready`
/// - `/resources/...` -- the resource API, counted as in-flight work
///
/// Request bodies above `max_body_bytes` are rejected with 413.
pub fn build_router(state: AppState) -> Router {
    let api = resources::routes().layer(axum::middleware::from_fn_with_state(
        Arc::clone(&state.shutdown),
        track_in_flight,
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(build_http_layers(&state.config))
        .with_state(state)
}

/// Manages the HTTP server lifecycle.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Shared shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Application state around the given pipeline and identity provider.
    #[must_use]
    pub fn app_state(
        &self,
        service: ResourceService,
        identity: Arc<dyn IdentityProvider>,
    ) -> AppState {
        AppState {
            service,
            identity,
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        }
    }

    /// Binds the TCP listener and returns the actual port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "TCP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves `state` until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, TLS material cannot be
    /// loaded, or the server hits a fatal I/O error.
    pub async fn serve(
        self,
        state: AppState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = build_router(state);

        self.shutdown.set_ready();

        // Flip to Draining as soon as the signal fires so new API requests
        // are refused while the listener winds down.
        let controller = Arc::clone(&self.shutdown);
        let signal = async move {
            shutdown.await;
            controller.trigger_shutdown();
        };

        if let Some(tls) = &self.config.tls {
            serve_tls(listener, router, tls, signal).await?;
        } else {
            info!("serving plain HTTP");
            axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await?;
        }

        self
            .shutdown
            .wait_for_drain(self.config.drain_timeout)
            .await;
        Ok(())
    }
}

/// Serves TLS with `axum-server` and rustls, reusing the pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        signal.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving TLS");
    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtIdentityProvider;
    use crate::service::ServiceConfig;
    use crate::storage::MemoryDataStore;

    fn state(module: &NetworkModule) -> AppState {
        module.app_state(
            ResourceService::new(Arc::new(MemoryDataStore::new()), ServiceConfig::default()),
            Arc::new(JwtIdentityProvider::from_secret(b"module-secret")),
        )
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = NetworkModule::new(NetworkConfig::default());
        assert!(module.listener.is_none());
    }

    #[test]
    fn app_state_shares_the_shutdown_controller() {
        let module = NetworkModule::new(NetworkConfig::default());
        let state = state(&module);
        assert!(Arc::ptr_eq(&state.shutdown, &module.shutdown_controller()));
    }

    #[test]
    fn build_router_creates_router() {
        let module = NetworkModule::new(NetworkConfig::default());
        let _router = build_router(state(&module));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        });
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = NetworkModule::new(NetworkConfig::default());
        let state = state(&module);
        let result = module.serve(state, std::future::pending::<()>()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown_signal() {
        let mut module = NetworkModule::new(NetworkConfig {
            host: "127.0.0.1".to_string(),
            ..NetworkConfig::default()
        });
        module.start().await.unwrap();
        let controller = module.shutdown_controller();
        let state = state(&module);

        module.serve(state, async {}).await.unwrap();
        assert_eq!(
            controller.health_state(),
            crate::network::HealthState::Stopped
        );
    }
}
