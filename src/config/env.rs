use super::DispatchConfig;
use tracing::warn;

impl DispatchConfig {
    /// Overrides settings from environment variables. Unparseable values are
    /// ignored with a warning and the previous value is kept.
    ///
    /// `lookup` abstracts `std::env::var` so tests need not touch the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %v, "Ignoring invalid PORT"),
            }
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = lookup("DISPATCH_INLINE") {
            match v.parse::<bool>() {
                Ok(b) => self.dispatch.inline_on_create = b,
                Err(_) => warn!(value = %v, "Ignoring invalid DISPATCH_INLINE"),
            }
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            if !v.trim().is_empty() {
                self.narrative.api_key = Some(v);
            }
        }
        if let Some(v) = lookup("OPENAI_BASE_URL") {
            self.narrative.base_url = v;
        }
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.narrative.model = v;
        }
        if let Some(v) = lookup("GEOCODER_URL") {
            self.geocoding.base_url = v;
        }
    }
}
