use super::{ApiError, AppState};
use crate::agent::AgentView;
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/agents", get(list_agents))
}

/// GET /agents - All agents with their current assignment
async fn list_agents(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AgentView>>, ApiError> {
    let agents = state
        .store
        .list_agents()?
        .into_iter()
        .map(|(agent, current_incident)| AgentView::new(agent, current_incident))
        .collect();
    Ok(Json(agents))
}
