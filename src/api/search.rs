use super::AppState;
use crate::geocode::{search_address, AddressResult};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search-address", get(search))
}

/// GET /search-address?query=...
///
/// Never fails: short or missing queries and geocoder errors give `[]`.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<AddressResult>> {
    let query = params.query.unwrap_or_default();
    Json(search_address(state.geocoder.as_ref(), &query).await)
}
