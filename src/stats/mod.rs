use crate::agent::AgentStatus;
use crate::incident::IncidentStatus;
use crate::scoring::compute_efficiency;
use crate::store::Store;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Aggregate counts and averages for `GET /stats`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_incidents: usize,
    pub active_incidents: usize,
    pub dispatched_incidents: usize,
    pub resolved_incidents: usize,
    pub total_agents: usize,
    pub active_agents: usize,
    pub average_response_time: f64,
    pub average_efficiency: f64,
}

/// Computes statistics over every stored incident and agent.
///
/// With `refresh` set, each agent's efficiency is recomputed from its history
/// and written back before averaging.
pub fn compute_stats(store: &Store, refresh: bool) -> Result<Stats> {
    let incidents = store.list_incidents()?;
    let mut agents: Vec<_> = store.list_agents()?.into_iter().map(|(a, _)| a).collect();

    if refresh {
        for agent in &mut agents {
            let efficiency = compute_efficiency(agent);
            if efficiency != agent.efficiency {
                store.update_agent_efficiency(agent.id, efficiency)?;
                agent.efficiency = efficiency;
            }
        }
    }

    let count = |status: IncidentStatus| incidents.iter().filter(|i| i.status == status).count();
    let total_agents = agents.len();
    let average = |sum: f64| {
        if total_agents == 0 {
            0.0
        } else {
            sum / total_agents as f64
        }
    };

    Ok(Stats {
        total_incidents: incidents.len(),
        active_incidents: count(IncidentStatus::Active),
        dispatched_incidents: count(IncidentStatus::Dispatched),
        resolved_incidents: count(IncidentStatus::Resolved),
        total_agents,
        active_agents: agents
            .iter()
            .filter(|a| a.status == AgentStatus::Responding)
            .count(),
        average_response_time: average(agents.iter().map(|a| a.response_time).sum()),
        average_efficiency: average(agents.iter().map(|a| a.efficiency).sum()),
    })
}
