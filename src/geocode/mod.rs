//! Address search passthrough.
//!
//! Queries go to a public search service through the [`Geocoder`] trait.
//! Short queries and upstream failures both produce an empty list.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

mod nominatim;

pub use nominatim::{NominatimClient, DEFAULT_BASE_URL};

/// Queries shorter than this never reach the geocoder.
pub const MIN_QUERY_LEN: usize = 3;

/// One geocoded address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressResult {
    pub lat: f64,
    pub lon: f64,
    pub address: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Vec<AddressResult>>;
}

/// Looks up `query`, absorbing every failure into an empty result.
pub async fn search_address(geocoder: &dyn Geocoder, query: &str) -> Vec<AddressResult> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }

    match geocoder.geocode(query).await {
        Ok(results) => results,
        Err(e) => {
            warn!(query = %query, error = %e, "Address search failed");
            Vec::new()
        }
    }
}
