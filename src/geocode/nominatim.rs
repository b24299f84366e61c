use super::{AddressResult, Geocoder};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Raw search hit. Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    display_name: String,
}

/// HTTP client for the OpenStreetMap Nominatim search API.
pub struct NominatimClient {
    http_client: Client,
    base_url: String,
    limit: u32,
}

impl NominatimClient {
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub fn new(base_url: String, limit: u32, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("citydispatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build geocoder HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limit,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Vec<AddressResult>> {
        let url = format!("{}/search", self.base_url);
        let limit = self.limit.to_string();
        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", limit.as_str())])
            .send()
            .await
            .context("Failed to send search request")?;

        if !response.status().is_success() {
            return Err(anyhow!("Geocoder error: {}", response.status()));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .context("Failed to parse search response")?;

        let results = places
            .into_iter()
            .filter_map(|place| match (place.lat.parse(), place.lon.parse()) {
                (Ok(lat), Ok(lon)) => Some(AddressResult {
                    lat,
                    lon,
                    address: place.display_name,
                }),
                _ => {
                    debug!(lat = %place.lat, lon = %place.lon, "Dropping unparseable search hit");
                    None
                }
            })
            .collect();

        Ok(results)
    }
}
