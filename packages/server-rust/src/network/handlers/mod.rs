//! HTTP handler definitions for the event board server.
//!
//! Defines `AppState` (the shared state carried through axum extractors) and
//! re-exports the handler functions used when building the router.

pub mod extract;
pub mod health;
pub mod resources;

pub use extract::Authenticated;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::service::ResourceService;
use crate::traits::IdentityProvider;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Request pipeline for the resource API.
    pub service: ResourceService,
    /// Verifies bearer credentials on authenticated routes.
    pub identity: Arc<dyn IdentityProvider>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, TLS, limits).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
