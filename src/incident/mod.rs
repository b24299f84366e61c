use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod validation;

pub use validation::{validate_new_incident, ValidationError};

/// Lifecycle of an incident. Only moves forward: active → dispatched → resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Active,
    Dispatched,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Active => "active",
            IncidentStatus::Dispatched => "dispatched",
            IncidentStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(IncidentStatus::Active),
            "dispatched" => Ok(IncidentStatus::Dispatched),
            "resolved" => Ok(IncidentStatus::Resolved),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Map position of an incident (WGS84 degrees)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// A reported incident as stored and returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    /// Free-text category ("fire", "medical", "accident", "crime", ...)
    #[serde(rename = "type")]
    pub incident_type: String,
    pub location: Location,
    pub description: String,
    pub status: IncidentStatus,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Incident submission body for `POST /incidents`.
///
/// `status` is optional and kept as a raw string so unknown values surface as
/// a validation error instead of a generic deserialization failure.
#[derive(Clone, Debug, Deserialize)]
pub struct NewIncident {
    #[serde(rename = "type")]
    pub incident_type: String,
    pub location: Location,
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl NewIncident {
    /// Validates the submission and returns the normalized status to store.
    pub fn validate(&self) -> Result<IncidentStatus, ValidationError> {
        validation::validate_new_incident(self)
    }
}
