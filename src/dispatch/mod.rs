//! Dispatch orchestration.
//!
//! # Flow
//!
//! ```text
//! incident ──> roster_for(type) ──> [role, ...]
//!                                     │  (agent missing → skipped)
//!                                     ▼
//!              estimate_response_time + build_justification
//!                                     │
//!                                     ▼
//!              commit_dispatch: re-read agent, update, append metric (one tx)
//!                                     │
//!                                     ▼
//!              incident.status = dispatched
//! ```
//!
//! Resolution releases every agent assigned to the incident and counts the
//! response as successful.

use crate::agent::{AgentRole, AgentStatus, AgentView};
use crate::incident::{Incident, IncidentStatus};
use crate::narrative::{build_justification, JustificationProvider};
use crate::scoring::{compute_efficiency, estimate_response_time, format_response_time};
use crate::store::{DispatchCommit, Store};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Agents sent to an incident, by incident type. Unknown types get a patrol.
pub fn roster_for(incident_type: &str) -> &'static [AgentRole] {
    match incident_type.trim().to_ascii_lowercase().as_str() {
        "fire" => &[AgentRole::Fire, AgentRole::Police],
        "medical" => &[AgentRole::Ems],
        "accident" => &[AgentRole::Ems, AgentRole::Police],
        "crime" => &[AgentRole::Police],
        _ => &[AgentRole::Police],
    }
}

/// Result of dispatching one agent.
#[derive(Clone, Debug, Serialize)]
pub struct AgentDispatch {
    pub agent: AgentView,
    pub decision: String,
    /// Formatted estimate, e.g. "2.1 min"
    pub response_time: String,
}

/// Result of dispatching an incident, keyed by agent name.
#[derive(Clone, Debug, Serialize)]
pub struct DispatchSummary {
    pub incident_id: i64,
    pub status: IncidentStatus,
    pub agents: BTreeMap<String, AgentDispatch>,
}

/// Dispatch and resolution errors
#[derive(Debug)]
pub enum DispatchError {
    NotFound(i64),
    AlreadyResolved(i64),
    Storage(anyhow::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NotFound(id) => write!(f, "Incident {} not found", id),
            DispatchError::AlreadyResolved(id) => {
                write!(f, "Incident {} is already resolved", id)
            }
            DispatchError::Storage(e) => write!(f, "storage error: {:#}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<anyhow::Error> for DispatchError {
    fn from(e: anyhow::Error) -> Self {
        DispatchError::Storage(e)
    }
}

/// Assigns agents to incidents and releases them on resolution.
pub struct Dispatcher {
    store: Arc<Store>,
    narrator: Arc<dyn JustificationProvider>,
    base_response_minutes: f64,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        narrator: Arc<dyn JustificationProvider>,
        base_response_minutes: f64,
    ) -> Self {
        Self {
            store,
            narrator,
            base_response_minutes,
        }
    }

    /// Dispatches the roster for `incident_id` and marks the incident dispatched.
    ///
    /// Roster agents missing from the store are skipped. Narrative failures
    /// never fail the dispatch. An incident resolved while narratives are
    /// pending yields `AlreadyResolved`.
    pub async fn dispatch(&self, incident_id: i64) -> Result<DispatchSummary, DispatchError> {
        let incident = self
            .store
            .get_incident(incident_id)?
            .ok_or(DispatchError::NotFound(incident_id))?;
        if incident.status == IncidentStatus::Resolved {
            return Err(DispatchError::AlreadyResolved(incident_id));
        }

        let mut agents = BTreeMap::new();
        for &role in roster_for(&incident.incident_type) {
            if let Some(dispatched) = self.dispatch_agent(&incident, role).await? {
                agents.insert(role.agent_name().to_string(), dispatched);
            }
        }

        if !self.store.mark_dispatched(incident.id)? {
            return Err(DispatchError::AlreadyResolved(incident_id));
        }

        info!(
            incident_id = incident.id,
            incident_type = %incident.incident_type,
            agents = agents.len(),
            "Incident dispatched"
        );

        Ok(DispatchSummary {
            incident_id: incident.id,
            status: IncidentStatus::Dispatched,
            agents,
        })
    }

    async fn dispatch_agent(
        &self,
        incident: &Incident,
        role: AgentRole,
    ) -> Result<Option<AgentDispatch>, DispatchError> {
        let name = role.agent_name();
        if self.store.get_agent_by_name(name)?.is_none() {
            // Deployments may run without some roster agents.
            debug!(agent = name, incident_id = incident.id, "Agent not found, skipping");
            return Ok(None);
        }

        let response_time =
            estimate_response_time(&incident.incident_type, self.base_response_minutes);
        let decision = build_justification(self.narrator.as_ref(), incident, role).await;

        let commit = self.store.commit_dispatch(name, incident.id, response_time, |agent| {
            agent.status = AgentStatus::Responding;
            agent.current_incident_id = Some(incident.id);
            agent.decision = Some(decision.clone());
            agent.response_time = response_time;
            agent.total_responses += 1;
            agent.efficiency = compute_efficiency(agent);
            agent.updated_at = Utc::now();
        })?;
        let agent = match commit {
            DispatchCommit::Assigned(agent) => agent,
            DispatchCommit::AgentMissing => {
                debug!(agent = name, incident_id = incident.id, "Agent removed, skipping");
                return Ok(None);
            }
            DispatchCommit::IncidentClosed => {
                return Err(DispatchError::AlreadyResolved(incident.id));
            }
        };

        info!(
            agent = %agent.name,
            incident_id = incident.id,
            response_time,
            efficiency = agent.efficiency,
            "Agent dispatched"
        );

        Ok(Some(AgentDispatch {
            agent: AgentView::new(agent, Some(incident.description.clone())),
            decision,
            response_time: format_response_time(response_time),
        }))
    }

    /// Resolves `incident_id`, releasing its agents and crediting each with a
    /// successful response. Resolving twice is a no-op.
    pub fn resolve(&self, incident_id: i64) -> Result<Incident, DispatchError> {
        let mut incident = self
            .store
            .get_incident(incident_id)?
            .ok_or(DispatchError::NotFound(incident_id))?;
        if incident.status == IncidentStatus::Resolved {
            return Ok(incident);
        }

        let now = Utc::now();
        let released = self
            .store
            .commit_resolution(incident_id, |agent| {
                agent.status = AgentStatus::Available;
                agent.current_incident_id = None;
                agent.successful_responses += 1;
                agent.efficiency = compute_efficiency(agent);
                agent.updated_at = now;
            })?
            .ok_or(DispatchError::NotFound(incident_id))?;

        info!(incident_id, released = released.len(), "Incident resolved");

        incident.status = IncidentStatus::Resolved;
        Ok(incident)
    }
}
