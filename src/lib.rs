pub mod api;
pub mod build;
pub mod config;
pub mod error;
pub mod event;
pub mod github;
pub mod signature;
pub mod utils;

use std::sync::Arc;

use crate::build::BuildClient;
use crate::config::Config;
use crate::github::JitConfigProvider;

/// Label a queued job must carry for this service to provision a runner.
pub const DEFAULT_RUNNER_LABEL: &str = "self-hosted";

/// Immutable clients-and-config bundle constructed once at startup and
/// shared read-only across all requests. No per-request state lives here.
pub struct AppState {
    pub config: Config,
    pub webhook_secret: Vec<u8>,
    pub jit: Arc<dyn JitConfigProvider>,
    pub builds: Arc<dyn BuildClient>,
}

pub type SharedState = Arc<AppState>;
