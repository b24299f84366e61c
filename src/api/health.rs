use super::AppState;
use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// GET / - Service banner
async fn root() -> Json<Value> {
    Json(json!({ "message": "Backend running", "status": "online" }))
}

/// GET /health - Liveness probe
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now().to_rfc3339() }))
}
