//! Responder agents.
//!
//! The agent set is fixed: one fire, one police and one ambulance agent are
//! seeded at startup and only ever mutated afterwards (by dispatch and
//! resolution).

use crate::scoring::format_response_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Efficiency reported for an agent with no dispatch history.
pub const DEFAULT_EFFICIENCY: f64 = 90.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Available,
    Responding,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "Available",
            AgentStatus::Responding => "Responding",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(AgentStatus::Available),
            "Responding" => Some(AgentStatus::Responding),
            _ => None,
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Responder role. Each role maps to exactly one seeded agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Fire,
    Police,
    Ems,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [AgentRole::Fire, AgentRole::Police, AgentRole::Ems];

    /// Name of the agent record that plays this role
    pub fn agent_name(&self) -> &'static str {
        match self {
            AgentRole::Fire => "Fire Agent",
            AgentRole::Police => "Police Agent",
            AgentRole::Ems => "Ambulance Agent",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            AgentRole::Fire => "🚒",
            AgentRole::Police => "🚓",
            AgentRole::Ems => "🚑",
        }
    }
}

/// Agent row as persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub status: AgentStatus,
    /// Incident this agent is currently dispatched to
    pub current_incident_id: Option<i64>,
    /// Last narrative produced for this agent
    pub decision: Option<String>,
    /// Last estimated response time, in minutes
    pub response_time: f64,
    pub efficiency: f64,
    pub total_responses: i64,
    pub successful_responses: i64,
    pub updated_at: DateTime<Utc>,
}

/// Public agent representation for `GET /agents` and dispatch summaries.
///
/// `current_incident` carries the description of the assigned incident so
/// the dashboard can label it; `current_incident_id` is the actual reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentView {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub status: AgentStatus,
    pub current_incident: Option<String>,
    pub current_incident_id: Option<i64>,
    pub decision: Option<String>,
    pub response_time: f64,
    pub response_time_display: String,
    pub efficiency: f64,
    pub total_responses: i64,
    pub successful_responses: i64,
    pub updated_at: DateTime<Utc>,
}

impl AgentView {
    pub fn new(agent: Agent, current_incident: Option<String>) -> Self {
        Self {
            response_time_display: format_response_time(agent.response_time),
            id: agent.id,
            name: agent.name,
            icon: agent.icon,
            status: agent.status,
            current_incident,
            current_incident_id: agent.current_incident_id,
            decision: agent.decision,
            response_time: agent.response_time,
            efficiency: agent.efficiency,
            total_responses: agent.total_responses,
            successful_responses: agent.successful_responses,
            updated_at: agent.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_capitalized() {
        assert_eq!(
            serde_json::to_value(AgentStatus::Responding).unwrap(),
            "Responding"
        );
        assert_eq!(AgentStatus::parse("Available"), Some(AgentStatus::Available));
        assert_eq!(AgentStatus::parse("available"), None);
    }

    #[test]
    fn test_view_formats_response_time() {
        let agent = Agent {
            id: 1,
            name: "Fire Agent".to_string(),
            icon: "🚒".to_string(),
            status: AgentStatus::Responding,
            current_incident_id: Some(4),
            decision: Some("Deploy two engines".to_string()),
            response_time: 2.14,
            efficiency: 84.0,
            total_responses: 1,
            successful_responses: 0,
            updated_at: Utc::now(),
        };
        let view = AgentView::new(agent, Some("Warehouse fire".to_string()));
        assert_eq!(view.response_time_display, "2.1 min");
        assert_eq!(view.current_incident.as_deref(), Some("Warehouse fire"));
        assert_eq!(view.current_incident_id, Some(4));
    }
}
