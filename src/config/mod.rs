mod env;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, `sqlite://path` or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "citydispatch.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Run dispatch inside `POST /incidents`
    #[serde(default = "default_inline_on_create")]
    pub inline_on_create: bool,
    #[serde(default = "default_base_response_minutes")]
    pub base_response_minutes: f64,
}

fn default_inline_on_create() -> bool {
    true
}

fn default_base_response_minutes() -> f64 {
    crate::scoring::DEFAULT_BASE_MINUTES
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            inline_on_create: default_inline_on_create(),
            base_response_minutes: default_base_response_minutes(),
        }
    }
}

/// Completion service. Without an API key the service runs offline and every
/// narrative is the fallback text.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_narrative_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_narrative_timeout")]
    pub timeout_secs: u64,
}

fn default_narrative_base_url() -> String {
    crate::narrative::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    crate::narrative::DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    80
}

fn default_temperature() -> f32 {
    0.5
}

fn default_narrative_timeout() -> u64 {
    10
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_narrative_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_narrative_timeout(),
        }
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoding_base_url")]
    pub base_url: String,
    #[serde(default = "default_geocoding_limit")]
    pub limit: u32,
    #[serde(default = "default_geocoding_timeout")]
    pub timeout_secs: u64,
}

fn default_geocoding_base_url() -> String {
    crate::geocode::DEFAULT_BASE_URL.to_string()
}

fn default_geocoding_limit() -> u32 {
    5
}

fn default_geocoding_timeout() -> u64 {
    5
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_base_url(),
            limit: default_geocoding_limit(),
            timeout_secs: default_geocoding_timeout(),
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Recompute and persist agent efficiency on every stats request
    #[serde(default = "default_refresh_efficiency")]
    pub refresh_efficiency: bool,
}

fn default_refresh_efficiency() -> bool {
    true
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            refresh_efficiency: default_refresh_efficiency(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<DispatchConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: DispatchConfig =
        toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path))?;
    Ok(config)
}

impl DispatchConfig {
    /// Builds the configuration: optional TOML file named by
    /// `CITYDISPATCH_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("CITYDISPATCH_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }
}
