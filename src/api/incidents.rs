use super::{ApiError, AppState};
use crate::dispatch::DispatchSummary;
use crate::incident::{Incident, IncidentStatus, NewIncident};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Response for `POST /incidents`
#[derive(Serialize)]
pub struct CreatedIncident {
    #[serde(flatten)]
    pub incident: Incident,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchSummary>,
}

/// Query parameters for `POST /assign-agent`
#[derive(Deserialize)]
pub struct AssignParams {
    pub incident_id: Option<i64>,
}

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/incidents", get(list_incidents).post(create_incident))
        .route("/incidents/:id", get(get_incident))
        .route("/incidents/:id/resolve", put(resolve_incident))
        .route("/dispatch-agents/:id", post(dispatch_agents))
        .route("/assign-agent", post(assign_agent))
}

/// GET /incidents - All incidents, oldest first
async fn list_incidents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Incident>>, ApiError> {
    Ok(Json(state.store.list_incidents()?))
}

/// GET /incidents/:id
async fn get_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Incident>, ApiError> {
    state
        .store
        .get_incident(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Incident {} not found", id)))
}

/// POST /incidents - Record an incident and, unless disabled, dispatch it
///
/// Once the incident is stored the response is always 201. A failed inline
/// dispatch is logged and reported as a missing `dispatch` field; the client
/// can retry with `POST /dispatch-agents/:id`.
async fn create_incident(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedIncident>), ApiError> {
    let submission: NewIncident =
        serde_json::from_slice(&body).map_err(|e| ApiError::Validation(e.to_string()))?;
    let status = submission.validate()?;

    let mut incident = state.store.insert_incident(
        submission.incident_type.trim(),
        submission.location,
        &submission.description,
        status,
    )?;

    info!(
        incident_id = incident.id,
        incident_type = %incident.incident_type,
        "Incident recorded"
    );

    let dispatch = if state.inline_dispatch && incident.status != IncidentStatus::Resolved {
        match state.dispatcher.dispatch(incident.id).await {
            Ok(summary) => {
                incident.status = summary.status;
                Some(summary)
            }
            Err(e) => {
                error!(incident_id = incident.id, error = %e, "Inline dispatch failed");
                None
            }
        }
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(CreatedIncident { incident, dispatch }),
    ))
}

/// PUT /incidents/:id/resolve
async fn resolve_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Incident>, ApiError> {
    Ok(Json(state.dispatcher.resolve(id)?))
}

/// POST /dispatch-agents/:id
async fn dispatch_agents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<DispatchSummary>, ApiError> {
    Ok(Json(state.dispatcher.dispatch(id).await?))
}

/// POST /assign-agent?incident_id=N - Dispatch alias used by the dashboard
async fn assign_agent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AssignParams>,
) -> Result<Json<DispatchSummary>, ApiError> {
    let id = params
        .incident_id
        .ok_or_else(|| ApiError::Validation("incident_id parameter is required".to_string()))?;
    Ok(Json(state.dispatcher.dispatch(id).await?))
}
