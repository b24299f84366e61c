use super::{ApiError, AppState};
use crate::store::HistoryEntry;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for dispatch history
#[derive(Deserialize)]
pub struct HistoryParams {
    /// Max entries to return (default: 100, max: 500)
    pub limit: Option<usize>,
}

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/incident-history", get(get_history))
}

/// GET /incident-history?limit=N
///
/// Returns dispatch events newest first.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    Ok(Json(state.store.list_history(clamp_limit(params.limit))?))
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(100).clamp(1, 500)
}
