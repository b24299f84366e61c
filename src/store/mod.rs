//! Incident, agent and response-metric persistence using SQLite.
//!
//! # Schema
//! ```sql
//! CREATE TABLE incidents (
//!     id          INTEGER PRIMARY KEY AUTOINCREMENT,
//!     type        TEXT NOT NULL,
//!     lat         REAL NOT NULL,
//!     lon         REAL NOT NULL,
//!     description TEXT NOT NULL,
//!     status      TEXT NOT NULL,   -- active | dispatched | resolved
//!     timestamp   TEXT NOT NULL    -- RFC 3339
//! );
//! CREATE TABLE agents (
//!     id                   INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name                 TEXT UNIQUE NOT NULL,
//!     icon                 TEXT NOT NULL,
//!     status               TEXT NOT NULL,  -- Available | Responding
//!     current_incident_id  INTEGER REFERENCES incidents(id),
//!     decision             TEXT,
//!     response_time        REAL NOT NULL,
//!     efficiency           REAL NOT NULL,
//!     total_responses      INTEGER NOT NULL,
//!     successful_responses INTEGER NOT NULL,
//!     updated_at           TEXT NOT NULL
//! );
//! CREATE TABLE response_metrics (
//!     id             INTEGER PRIMARY KEY AUTOINCREMENT,
//!     agent_id       INTEGER NOT NULL REFERENCES agents(id),
//!     incident_id    INTEGER NOT NULL REFERENCES incidents(id),
//!     response_time  REAL NOT NULL,
//!     was_successful INTEGER NOT NULL,
//!     timestamp      TEXT NOT NULL
//! );
//! ```
//!
//! The connection is wrapped in a `Mutex`; every method takes the lock for the
//! duration of one statement or one transaction and never across an await.

use crate::agent::{Agent, AgentRole, AgentStatus, DEFAULT_EFFICIENCY};
use crate::incident::{Incident, IncidentStatus, Location};
use crate::scoring::format_response_time;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::info;


/// One dispatch event from the append-only audit trail.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseMetric {
    pub id: i64,
    pub agent_id: i64,
    pub incident_id: i64,
    pub response_time: f64,
    pub was_successful: bool,
    pub timestamp: DateTime<Utc>,
}

/// Event type of every history entry; metrics are only written on dispatch.
pub const DISPATCH_EVENT: &str = "dispatch";

/// A response metric joined with the agent and incident it refers to.
///
/// `event_type` and `description` are the columns the dashboard log renders.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub metric: ResponseMetric,
    pub event_type: String,
    pub description: String,
    pub agent_name: String,
    pub incident_type: String,
    pub incident_description: String,
}

impl HistoryEntry {
    fn new(
        metric: ResponseMetric,
        agent_name: String,
        incident_type: String,
        incident_description: String,
    ) -> Self {
        let description = format!(
            "{} dispatched to {} incident \"{}\" (ETA {})",
            agent_name,
            incident_type,
            incident_description,
            format_response_time(metric.response_time)
        );
        Self {
            metric,
            event_type: DISPATCH_EVENT.to_string(),
            description,
            agent_name,
            incident_type,
            incident_description,
        }
    }
}

/// Outcome of [`Store::commit_dispatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchCommit {
    /// The agent as written.
    Assigned(Agent),
    /// No agent with that name; nothing written.
    AgentMissing,
    /// The incident is resolved or gone; nothing written.
    IncidentClosed,
}

/// SQLite-backed storage for all three record types.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database named by `url` and ensures the schema.
    ///
    /// Accepts a plain path, `sqlite://path`, `sqlite:path` or `:memory:`.
    pub fn open(url: &str) -> Result<Self> {
        let path = database_path(url);
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Store connection lock poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS incidents (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                type        TEXT NOT NULL,
                lat         REAL NOT NULL,
                lon         REAL NOT NULL,
                description TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'active',
                timestamp   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_incidents_type ON incidents(type);
            CREATE INDEX IF NOT EXISTS idx_incidents_timestamp ON incidents(timestamp);
            CREATE TABLE IF NOT EXISTS agents (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                name                 TEXT UNIQUE NOT NULL,
                icon                 TEXT NOT NULL,
                status               TEXT NOT NULL DEFAULT 'Available',
                current_incident_id  INTEGER REFERENCES incidents(id),
                decision             TEXT,
                response_time        REAL NOT NULL DEFAULT 0.0,
                efficiency           REAL NOT NULL DEFAULT 90.0,
                total_responses      INTEGER NOT NULL DEFAULT 0,
                successful_responses INTEGER NOT NULL DEFAULT 0,
                updated_at           TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS response_metrics (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id       INTEGER NOT NULL REFERENCES agents(id),
                incident_id    INTEGER NOT NULL REFERENCES incidents(id),
                response_time  REAL NOT NULL,
                was_successful INTEGER NOT NULL DEFAULT 1,
                timestamp      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_metrics_agent ON response_metrics(agent_id);
            CREATE INDEX IF NOT EXISTS idx_metrics_incident ON response_metrics(incident_id);",
        )
        .context("Failed to create tables")?;
        Ok(())
    }

    /// Inserts the fixed agent roster if the agents table is empty.
    ///
    /// Returns the number of agents inserted (0 when already seeded).
    pub fn seed_agents(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let existing: i64 = conn
            .query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))
            .context("Failed to count agents")?;
        if existing > 0 {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction().context("Failed to begin seed transaction")?;
        for role in AgentRole::ALL {
            tx.execute(
                "INSERT INTO agents (name, icon, status, response_time, efficiency,
                                     total_responses, successful_responses, updated_at)
                 VALUES (?1, ?2, ?3, 0.0, ?4, 0, 0, ?5)",
                params![
                    role.agent_name(),
                    role.icon(),
                    AgentStatus::Available.as_str(),
                    DEFAULT_EFFICIENCY,
                    now
                ],
            )
            .with_context(|| format!("Failed to seed {}", role.agent_name()))?;
        }
        tx.commit().context("Failed to commit agent seed")?;

        info!(count = AgentRole::ALL.len(), "Seeded agents");
        Ok(AgentRole::ALL.len())
    }

    // ---------------------------------------------------------------------
    // Incidents
    // ---------------------------------------------------------------------

    /// Inserts a new incident stamped with the current time.
    pub fn insert_incident(
        &self,
        incident_type: &str,
        location: Location,
        description: &str,
        status: IncidentStatus,
    ) -> Result<Incident> {
        let timestamp = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO incidents (type, lat, lon, description, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                incident_type,
                location.lat,
                location.lon,
                description,
                status.as_str(),
                timestamp.to_rfc3339()
            ],
        )
        .context("Failed to insert incident")?;

        Ok(Incident {
            id: conn.last_insert_rowid(),
            incident_type: incident_type.to_string(),
            location,
            description: description.to_string(),
            status,
            timestamp,
        })
    }

    pub fn get_incident(&self, id: i64) -> Result<Option<Incident>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, type, lat, lon, description, status, timestamp
             FROM incidents WHERE id = ?1",
            params![id],
            incident_from_row,
        )
        .optional()
        .context("Failed to read incident")
    }

    /// All incidents, oldest first.
    pub fn list_incidents(&self) -> Result<Vec<Incident>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, type, lat, lon, description, status, timestamp
                 FROM incidents ORDER BY id",
            )
            .context("Failed to prepare query")?;
        let incidents = stmt
            .query_map([], incident_from_row)
            .context("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read incidents")?;
        Ok(incidents)
    }

    // ---------------------------------------------------------------------
    // Agents
    // ---------------------------------------------------------------------

    /// All agents, each paired with the description of its current incident.
    pub fn list_agents(&self) -> Result<Vec<(Agent, Option<String>)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {AGENT_COLUMNS}, i.description
                 FROM agents a LEFT JOIN incidents i ON i.id = a.current_incident_id
                 ORDER BY a.id"
            ))
            .context("Failed to prepare query")?;
        let agents = stmt
            .query_map([], |row| {
                Ok((agent_from_row(row)?, row.get::<_, Option<String>>(11)?))
            })
            .context("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read agents")?;
        Ok(agents)
    }

    pub fn get_agent_by_name(&self, name: &str) -> Result<Option<Agent>> {
        agent_by_name(&*self.conn()?, name)
    }

    /// Persists a recomputed efficiency score for one agent.
    pub fn update_agent_efficiency(&self, agent_id: i64, efficiency: f64) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE agents SET efficiency = ?1 WHERE id = ?2",
                params![efficiency, agent_id],
            )
            .context("Failed to update agent efficiency")?;
        Ok(())
    }

    /// Assigns the named agent to `incident_id` and appends its response
    /// metric, in one transaction.
    ///
    /// The agent row is read inside the transaction and handed to `update`, so
    /// changes committed by a concurrent resolution are never overwritten.
    pub fn commit_dispatch<F>(
        &self,
        agent_name: &str,
        incident_id: i64,
        response_time: f64,
        update: F,
    ) -> Result<DispatchCommit>
    where
        F: FnOnce(&mut Agent),
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .context("Failed to begin dispatch transaction")?;

        let status = tx
            .query_row(
                "SELECT status FROM incidents WHERE id = ?1",
                params![incident_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to read incident status")?;
        match status.as_deref() {
            Some(s) if s != IncidentStatus::Resolved.as_str() => {}
            _ => return Ok(DispatchCommit::IncidentClosed),
        }

        let Some(mut agent) = agent_by_name(&tx, agent_name)? else {
            return Ok(DispatchCommit::AgentMissing);
        };
        update(&mut agent);
        write_agent(&tx, &agent)?;
        tx.execute(
            "INSERT INTO response_metrics
                 (agent_id, incident_id, response_time, was_successful, timestamp)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![agent.id, incident_id, response_time, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert response metric")?;
        tx.commit().context("Failed to commit dispatch")?;
        Ok(DispatchCommit::Assigned(agent))
    }

    /// Marks an incident dispatched unless it has been resolved meanwhile.
    pub fn mark_dispatched(&self, incident_id: i64) -> Result<bool> {
        let rows = self
            .conn()?
            .execute(
                "UPDATE incidents SET status = ?1 WHERE id = ?2 AND status != ?3",
                params![
                    IncidentStatus::Dispatched.as_str(),
                    incident_id,
                    IncidentStatus::Resolved.as_str()
                ],
            )
            .context("Failed to mark incident dispatched")?;
        Ok(rows > 0)
    }

    /// Marks an incident resolved and applies `release` to every agent
    /// assigned to it, in one transaction.
    ///
    /// Returns the released agents, or `None` (writing nothing) if there is no
    /// such incident.
    pub fn commit_resolution<F>(
        &self,
        incident_id: i64,
        mut release: F,
    ) -> Result<Option<Vec<Agent>>>
    where
        F: FnMut(&mut Agent),
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .context("Failed to begin resolution transaction")?;
        let rows = tx
            .execute(
                "UPDATE incidents SET status = ?1 WHERE id = ?2",
                params![IncidentStatus::Resolved.as_str(), incident_id],
            )
            .context("Failed to resolve incident")?;
        if rows == 0 {
            return Ok(None);
        }

        let mut released = assigned_agents(&tx, incident_id)?;
        for agent in &mut released {
            release(agent);
            write_agent(&tx, agent)?;
        }
        tx.commit().context("Failed to commit resolution")?;
        Ok(Some(released))
    }

    // ---------------------------------------------------------------------
    // Response metrics
    // ---------------------------------------------------------------------

    /// Most recent dispatch events first, at most `limit`.
    pub fn list_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT m.id, m.agent_id, m.incident_id, m.response_time, m.was_successful,
                        m.timestamp, a.name, i.type, i.description
                 FROM response_metrics m
                 JOIN agents a ON a.id = m.agent_id
                 JOIN incidents i ON i.id = m.incident_id
                 ORDER BY m.id DESC
                 LIMIT ?1",
            )
            .context("Failed to prepare query")?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(HistoryEntry::new(
                    metric_from_row(row)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })
            .context("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read history")?;
        Ok(entries)
    }

    /// Metrics recorded for one agent on one incident.
    pub fn metrics_for(&self, agent_id: i64, incident_id: i64) -> Result<Vec<ResponseMetric>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, agent_id, incident_id, response_time, was_successful, timestamp
                 FROM response_metrics WHERE agent_id = ?1 AND incident_id = ?2 ORDER BY id",
            )
            .context("Failed to prepare query")?;
        let metrics = stmt
            .query_map(params![agent_id, incident_id], metric_from_row)
            .context("Failed to execute query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read metrics")?;
        Ok(metrics)
    }
}

#[cfg(test)]
impl Store {
    /// Agents whose current assignment is `incident_id`.
    pub(crate) fn agents_assigned_to(&self, incident_id: i64) -> Result<Vec<Agent>> {
        assigned_agents(&*self.conn()?, incident_id)
    }

    /// Runs raw SQL against the store; lets tests shape deployments the
    /// public API cannot produce (e.g. a missing agent).
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}

const AGENT_COLUMNS: &str = "a.id, a.name, a.icon, a.status, a.current_incident_id, a.decision, \
     a.response_time, a.efficiency, a.total_responses, a.successful_responses, a.updated_at";

fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

fn agent_by_name(conn: &Connection, name: &str) -> Result<Option<Agent>> {
    conn.query_row(
        &format!("SELECT {AGENT_COLUMNS} FROM agents a WHERE a.name = ?1"),
        params![name],
        agent_from_row,
    )
    .optional()
    .context("Failed to read agent")
}

fn assigned_agents(conn: &Connection, incident_id: i64) -> Result<Vec<Agent>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents a
             WHERE a.current_incident_id = ?1 ORDER BY a.id"
        ))
        .context("Failed to prepare query")?;
    let agents = stmt
        .query_map(params![incident_id], agent_from_row)
        .context("Failed to execute query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read agents")?;
    Ok(agents)
}

fn write_agent(conn: &Connection, agent: &Agent) -> Result<()> {
    conn.execute(
        "UPDATE agents SET status = ?1, current_incident_id = ?2, decision = ?3,
                response_time = ?4, efficiency = ?5, total_responses = ?6,
                successful_responses = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            agent.status.as_str(),
            agent.current_incident_id,
            agent.decision,
            agent.response_time,
            agent.efficiency,
            agent.total_responses,
            agent.successful_responses,
            agent.updated_at.to_rfc3339(),
            agent.id
        ],
    )
    .with_context(|| format!("Failed to update agent {}", agent.name))?;
    Ok(())
}

fn incident_from_row(row: &Row<'_>) -> rusqlite::Result<Incident> {
    let status: String = row.get(5)?;
    let status = status
        .parse::<IncidentStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(Incident {
        id: row.get(0)?,
        incident_type: row.get(1)?,
        location: Location {
            lat: row.get(2)?,
            lon: row.get(3)?,
        },
        description: row.get(4)?,
        status,
        timestamp: timestamp_column(row, 6)?,
    })
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let status: String = row.get(3)?;
    let status = AgentStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown agent status '{}'", status).into(),
        )
    })?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        status,
        current_incident_id: row.get(4)?,
        decision: row.get(5)?,
        response_time: row.get(6)?,
        efficiency: row.get(7)?,
        total_responses: row.get(8)?,
        successful_responses: row.get(9)?,
        updated_at: timestamp_column(row, 10)?,
    })
}

fn metric_from_row(row: &Row<'_>) -> rusqlite::Result<ResponseMetric> {
    Ok(ResponseMetric {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        incident_id: row.get(2)?,
        response_time: row.get(3)?,
        was_successful: row.get(4)?,
        timestamp: timestamp_column(row, 5)?,
    })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
