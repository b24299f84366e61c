use super::{ApiError, AppState};
use crate::stats::{compute_stats, Stats};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /stats
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(compute_stats(&state.store, state.refresh_stats)?))
}
