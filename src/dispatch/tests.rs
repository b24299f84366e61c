use super::*;
use crate::incident::Location;
use crate::narrative::{Prompt, FALLBACK_JUSTIFICATION};
use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::Notify;

struct EchoNarrator;

#[async_trait]
impl JustificationProvider for EchoNarrator {
    async fn justify(&self, prompt: &Prompt) -> anyhow::Result<String> {
        Ok(format!("plan: {}", prompt.user.lines().next().unwrap_or_default()))
    }
}

struct DownNarrator;

#[async_trait]
impl JustificationProvider for DownNarrator {
    async fn justify(&self, _prompt: &Prompt) -> anyhow::Result<String> {
        Err(anyhow!("timed out"))
    }
}

/// Holds every narrative until the test releases it.
#[derive(Default)]
struct GatedNarrator {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl JustificationProvider for GatedNarrator {
    async fn justify(&self, _prompt: &Prompt) -> anyhow::Result<String> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("Hold position until cleared.".to_string())
    }
}

fn setup(narrator: Arc<dyn JustificationProvider>) -> (Arc<Store>, Dispatcher) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    store.seed_agents().unwrap();
    let dispatcher = Dispatcher::new(Arc::clone(&store), narrator, 2.0);
    (store, dispatcher)
}

fn report(store: &Store, incident_type: &str, description: &str) -> Incident {
    store
        .insert_incident(
            incident_type,
            Location {
                lat: 34.05,
                lon: -118.24,
            },
            description,
            IncidentStatus::Active,
        )
        .unwrap()
}

fn names(summary: &DispatchSummary) -> Vec<&str> {
    summary.agents.keys().map(String::as_str).collect()
}

#[test]
fn test_roster_table() {
    assert_eq!(roster_for("fire"), &[AgentRole::Fire, AgentRole::Police]);
    assert_eq!(roster_for("medical"), &[AgentRole::Ems]);
    assert_eq!(roster_for("accident"), &[AgentRole::Ems, AgentRole::Police]);
    assert_eq!(roster_for("crime"), &[AgentRole::Police]);
    assert_eq!(roster_for(" FIRE "), &[AgentRole::Fire, AgentRole::Police]);
    assert_eq!(roster_for("alien landing"), &[AgentRole::Police]);
    assert_eq!(roster_for(""), &[AgentRole::Police]);
}

#[tokio::test]
async fn test_fire_dispatches_fire_and_police() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "fire", "Apartment fire on Elm");

    let summary = dispatcher.dispatch(incident.id).await.unwrap();

    assert_eq!(names(&summary), vec!["Fire Agent", "Police Agent"]);
    assert_eq!(summary.status, IncidentStatus::Dispatched);
    assert_eq!(
        store.get_incident(incident.id).unwrap().unwrap().status,
        IncidentStatus::Dispatched
    );
}

#[tokio::test]
async fn test_medical_and_unknown_rosters() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));

    let medical = report(&store, "medical", "Cardiac arrest");
    let summary = dispatcher.dispatch(medical.id).await.unwrap();
    assert_eq!(names(&summary), vec!["Ambulance Agent"]);

    let other = report(&store, "noise", "Loud party");
    let summary = dispatcher.dispatch(other.id).await.unwrap();
    assert_eq!(names(&summary), vec!["Police Agent"]);
}

#[tokio::test]
async fn test_dispatch_updates_agent_and_records_metric() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "medical", "Cyclist down");

    let summary = dispatcher.dispatch(incident.id).await.unwrap();
    let result = &summary.agents["Ambulance Agent"];
    assert_eq!(result.decision, "plan: Incident type: medical");
    assert!(result.response_time.ends_with(" min"));

    let agent = store.get_agent_by_name("Ambulance Agent").unwrap().unwrap();
    assert_eq!(agent.status, AgentStatus::Responding);
    assert_eq!(agent.current_incident_id, Some(incident.id));
    assert_eq!(agent.total_responses, 1);
    assert_eq!(agent.successful_responses, 0);
    assert!(agent.response_time >= 1.7 && agent.response_time <= 2.3);
    assert_eq!(agent.efficiency, compute_efficiency(&agent));
    assert_eq!(agent.decision.as_deref(), Some("plan: Incident type: medical"));
    assert_eq!(result.agent.current_incident.as_deref(), Some("Cyclist down"));

    let metrics = store.metrics_for(agent.id, incident.id).unwrap();
    assert_eq!(metrics.len(), 1);
    assert!(metrics[0].was_successful);
    assert_eq!(metrics[0].response_time, agent.response_time);

    // Agents outside the roster are untouched
    let fire = store.get_agent_by_name("Fire Agent").unwrap().unwrap();
    assert_eq!(fire.status, AgentStatus::Available);
    assert_eq!(fire.total_responses, 0);
}

#[tokio::test]
async fn test_narrative_outage_does_not_fail_dispatch() {
    let (store, dispatcher) = setup(Arc::new(DownNarrator));
    let incident = report(&store, "crime", "Bank robbery");

    let summary = dispatcher.dispatch(incident.id).await.unwrap();
    assert_eq!(summary.agents["Police Agent"].decision, FALLBACK_JUSTIFICATION);

    let police = store.get_agent_by_name("Police Agent").unwrap().unwrap();
    assert_eq!(police.decision.as_deref(), Some(FALLBACK_JUSTIFICATION));
    assert_eq!(police.total_responses, 1);
}

#[tokio::test]
async fn test_missing_agent_is_skipped() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    store
        .execute_raw("DELETE FROM agents WHERE name = 'Fire Agent'")
        .unwrap();
    let incident = report(&store, "fire", "Brush fire");

    let summary = dispatcher.dispatch(incident.id).await.unwrap();
    assert_eq!(names(&summary), vec!["Police Agent"]);
    assert_eq!(
        store.get_incident(incident.id).unwrap().unwrap().status,
        IncidentStatus::Dispatched
    );
}

#[tokio::test]
async fn test_dispatch_unknown_incident() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let result = dispatcher.dispatch(42).await;
    assert!(matches!(result, Err(DispatchError::NotFound(42))));
    assert!(store.list_history(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_dispatch_resolved_incident_is_rejected() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "crime", "Shoplifting");
    dispatcher.resolve(incident.id).unwrap();

    let result = dispatcher.dispatch(incident.id).await;
    assert!(matches!(result, Err(DispatchError::AlreadyResolved(_))));
    assert_eq!(
        store.get_incident(incident.id).unwrap().unwrap().status,
        IncidentStatus::Resolved
    );
}

#[tokio::test]
async fn test_resolve_releases_assigned_agents() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "accident", "Highway crash");
    dispatcher.dispatch(incident.id).await.unwrap();

    let resolved = dispatcher.resolve(incident.id).unwrap();
    assert_eq!(resolved.status, IncidentStatus::Resolved);

    for name in ["Ambulance Agent", "Police Agent"] {
        let agent = store.get_agent_by_name(name).unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Available, "{}", name);
        assert_eq!(agent.current_incident_id, None);
        assert_eq!(agent.total_responses, 1);
        assert_eq!(agent.successful_responses, 1);
        assert_eq!(agent.efficiency, compute_efficiency(&agent));
    }
    assert!(store.agents_assigned_to(incident.id).unwrap().is_empty());
    assert_eq!(
        store.get_incident(incident.id).unwrap().unwrap().status,
        IncidentStatus::Resolved
    );
}

#[tokio::test]
async fn test_resolve_only_releases_agents_of_that_incident() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    // Same description on purpose: assignment is by id, not text.
    let first = report(&store, "medical", "Person collapsed");
    let second = report(&store, "crime", "Person collapsed");
    dispatcher.dispatch(first.id).await.unwrap();
    dispatcher.dispatch(second.id).await.unwrap();

    dispatcher.resolve(first.id).unwrap();

    let ambulance = store.get_agent_by_name("Ambulance Agent").unwrap().unwrap();
    assert_eq!(ambulance.status, AgentStatus::Available);
    let police = store.get_agent_by_name("Police Agent").unwrap().unwrap();
    assert_eq!(police.status, AgentStatus::Responding);
    assert_eq!(police.current_incident_id, Some(second.id));
    assert_eq!(police.successful_responses, 0);
}

#[tokio::test]
async fn test_resolve_twice_is_noop() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "crime", "Pickpocket");
    dispatcher.dispatch(incident.id).await.unwrap();

    dispatcher.resolve(incident.id).unwrap();
    dispatcher.resolve(incident.id).unwrap();

    let police = store.get_agent_by_name("Police Agent").unwrap().unwrap();
    assert_eq!(police.successful_responses, 1);
}

#[test]
fn test_resolve_unknown_incident_mutates_nothing() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let before: Vec<_> = store.list_agents().unwrap();

    let result = dispatcher.resolve(9000);
    assert!(matches!(result, Err(DispatchError::NotFound(9000))));

    let after: Vec<_> = store.list_agents().unwrap();
    assert_eq!(before, after);
    assert!(store.list_incidents().unwrap().is_empty());
}

#[tokio::test]
async fn test_resolution_during_pending_narrative_keeps_credit() {
    let (store, dispatcher) = setup(Arc::new(EchoNarrator));
    let first = report(&store, "crime", "Burglary");
    let second = report(&store, "crime", "Car theft");
    dispatcher.dispatch(first.id).await.unwrap();

    let gate = Arc::new(GatedNarrator::default());
    let gated = Dispatcher::new(Arc::clone(&store), gate.clone(), 2.0);
    let (dispatched, resolved) = tokio::join!(gated.dispatch(second.id), async {
        gate.entered.notified().await;
        let resolved = dispatcher.resolve(first.id);
        gate.release.notify_one();
        resolved
    });
    dispatched.unwrap();
    resolved.unwrap();

    let police = store.get_agent_by_name("Police Agent").unwrap().unwrap();
    assert_eq!(police.total_responses, 2);
    assert_eq!(police.successful_responses, 1);
    assert_eq!(police.status, AgentStatus::Responding);
    assert_eq!(police.current_incident_id, Some(second.id));
    assert_eq!(police.decision.as_deref(), Some("Hold position until cleared."));
    assert_eq!(police.efficiency, compute_efficiency(&police));
}

#[tokio::test]
async fn test_incident_resolved_during_pending_narrative_stays_resolved() {
    let (store, _) = setup(Arc::new(EchoNarrator));
    let incident = report(&store, "crime", "Mugging");

    let gate = Arc::new(GatedNarrator::default());
    let gated = Dispatcher::new(Arc::clone(&store), gate.clone(), 2.0);
    let (dispatched, resolved) = tokio::join!(gated.dispatch(incident.id), async {
        gate.entered.notified().await;
        let resolved = gated.resolve(incident.id);
        gate.release.notify_one();
        resolved
    });
    assert!(matches!(dispatched, Err(DispatchError::AlreadyResolved(_))));
    resolved.unwrap();

    assert_eq!(
        store.get_incident(incident.id).unwrap().unwrap().status,
        IncidentStatus::Resolved
    );
    let police = store.get_agent_by_name("Police Agent").unwrap().unwrap();
    assert_eq!(police.status, AgentStatus::Available);
    assert_eq!(police.current_incident_id, None);
    assert_eq!(police.total_responses, 0);
    assert!(store.metrics_for(police.id, incident.id).unwrap().is_empty());
}
