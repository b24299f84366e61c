//! Per-agent dispatch justifications from an external completion service.
//!
//! The service is reached through [`JustificationProvider`] so dispatch can be
//! exercised with deterministic fakes. Failures never escape this module:
//! [`build_justification`] swaps them for [`FALLBACK_JUSTIFICATION`].

use crate::agent::AgentRole;
use crate::incident::Incident;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

mod openai;

pub use openai::{OpenAiJustifier, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Returned whenever the completion service cannot produce a narrative.
pub const FALLBACK_JUSTIFICATION: &str = "Decision unavailable: narrative service offline.";

/// A chat-style prompt: one system instruction, one user message.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Completion service capable of turning a prompt into short free text.
#[async_trait]
pub trait JustificationProvider: Send + Sync {
    async fn justify(&self, prompt: &Prompt) -> Result<String>;
}

/// Provider used when no completion service is configured. Always fails, so
/// every dispatch records the fallback text.
pub struct OfflineJustifier;

#[async_trait]
impl JustificationProvider for OfflineJustifier {
    async fn justify(&self, _prompt: &Prompt) -> Result<String> {
        Err(anyhow!("no completion service configured"))
    }
}

/// Builds the role-specific prompt for an incident.
pub fn build_prompt(incident: &Incident, role: AgentRole) -> Prompt {
    let system = match role {
        AgentRole::Fire => {
            "You are the fire department's dispatch coordinator. \
             Explain in one or two sentences how the fire unit will respond: \
             equipment, approach and immediate priorities."
        }
        AgentRole::Police => {
            "You are the police dispatch coordinator. \
             Explain in one or two sentences how the patrol unit will respond: \
             scene security, traffic control and public safety."
        }
        AgentRole::Ems => {
            "You are the emergency medical services dispatch coordinator. \
             Explain in one or two sentences how the ambulance crew will respond: \
             triage, treatment and transport."
        }
    };

    Prompt {
        system: system.to_string(),
        user: format!(
            "Incident type: {}\nDescription: {}\nState the {} response plan.",
            incident.incident_type,
            incident.description,
            role.agent_name()
        ),
    }
}

/// Requests a justification for `role` responding to `incident`.
///
/// Any provider failure, including an empty completion, yields
/// [`FALLBACK_JUSTIFICATION`].
pub async fn build_justification(
    provider: &dyn JustificationProvider,
    incident: &Incident,
    role: AgentRole,
) -> String {
    let prompt = build_prompt(incident, role);
    match provider.justify(&prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            debug!(incident_id = incident.id, agent = role.agent_name(), "Narrative received");
            text.trim().to_string()
        }
        Ok(_) => {
            warn!(
                incident_id = incident.id,
                agent = role.agent_name(),
                "Completion service returned empty narrative, using fallback"
            );
            FALLBACK_JUSTIFICATION.to_string()
        }
        Err(e) => {
            warn!(
                incident_id = incident.id,
                agent = role.agent_name(),
                error = %e,
                "Narrative request failed, using fallback"
            );
            FALLBACK_JUSTIFICATION.to_string()
        }
    }
}
