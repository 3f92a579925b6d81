use std::path::Path;
use std::sync::Arc;

use axum::{Router, routing};
use runner_dispatch::api::{handle_webhook, healthz, version};
use runner_dispatch::build::HttpBuildClient;
use runner_dispatch::config::Config;
use runner_dispatch::error::WebhookError;
use runner_dispatch::github::GitHubApp;
use runner_dispatch::utils::{FileReader, OsFileReader};
use runner_dispatch::{AppState, SharedState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn build_state(config: Config) -> Result<SharedState, WebhookError> {
    let reader = OsFileReader;

    let webhook_secret = reader.read_file(Path::new(&config.webhook_secret_path()))?;
    let private_key = reader.read_file(Path::new(&config.github_app_private_key_path))?;

    let app = GitHubApp::new(
        config.github_app_id.clone(),
        &private_key,
        config.github_api_base_url.clone(),
    )?;
    let builds = HttpBuildClient::new(config.build_api_base_url.clone());

    Ok(Arc::new(AppState {
        config,
        webhook_secret,
        jit: Arc::new(app),
        builds: Arc::new(builds),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = config.bind_address.clone();
    let state = match build_state(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            std::process::exit(1);
        }
    };

    let app = Router::new()
        .route("/webhook", routing::post(handle_webhook))
        .route("/healthz", routing::get(healthz))
        .route("/version", routing::get(version))
        .with_state(state);

    info!("Listening on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}
