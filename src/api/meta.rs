//! Liveness and version endpoints

use axum::Json;
use serde_json::json;

/// GET /healthz - liveness probe, 200 whenever the process is up
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /version - build version metadata
pub async fn version() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
