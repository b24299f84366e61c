use super::{IncidentStatus, NewIncident};
use std::fmt;

/// Validation errors for incident submissions
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingType,
    MissingDescription,
    InvalidLatitude(f64),
    InvalidLongitude(f64),
    UnknownStatus(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingType => write!(f, "type is required"),
            ValidationError::MissingDescription => write!(f, "description is required"),
            ValidationError::InvalidLatitude(lat) => {
                write!(f, "location.lat must be between -90 and 90, got {}", lat)
            }
            ValidationError::InvalidLongitude(lon) => {
                write!(f, "location.lon must be between -180 and 180, got {}", lon)
            }
            ValidationError::UnknownStatus(s) => write!(
                f,
                "unknown status '{}': expected one of active, dispatched, resolved",
                s
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates an incident submission.
///
/// Rules:
/// - type and description must be non-blank
/// - lat in [-90, 90], lon in [-180, 180] (NaN rejected)
/// - status, if given, must be a known status; defaults to `active`
pub fn validate_new_incident(incident: &NewIncident) -> Result<IncidentStatus, ValidationError> {
    if incident.incident_type.trim().is_empty() {
        return Err(ValidationError::MissingType);
    }
    if incident.description.trim().is_empty() {
        return Err(ValidationError::MissingDescription);
    }

    let lat = incident.location.lat;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    let lon = incident.location.lon;
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidLongitude(lon));
    }

    match incident.status.as_deref() {
        None => Ok(IncidentStatus::Active),
        Some(s) => s.trim().to_ascii_lowercase().parse(),
    }
}
