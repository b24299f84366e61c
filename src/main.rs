use anyhow::{Context, Result};
use citydispatch::api::{create_router, AppState};
use citydispatch::config::DispatchConfig;
use citydispatch::geocode::{Geocoder, NominatimClient};
use citydispatch::narrative::{JustificationProvider, OfflineJustifier, OpenAiJustifier};
use citydispatch::store::Store;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "citydispatch=info".into()),
        )
        .init();

    info!("CityDispatch starting...");

    let config = DispatchConfig::load()?;
    info!(
        bind_addr = %config.server.bind_addr(),
        database = %config.database.url,
        inline_dispatch = config.dispatch.inline_on_create,
        "Configuration loaded"
    );

    let store = Arc::new(Store::open(&config.database.url).context("Failed to open database")?);
    let seeded = store.seed_agents().context("Failed to seed agents")?;
    if seeded > 0 {
        info!(count = seeded, "Seeded agent roster");
    }

    let narrator: Arc<dyn JustificationProvider> = match &config.narrative.api_key {
        Some(key) => Arc::new(OpenAiJustifier::new(
            key.clone(),
            config.narrative.base_url.clone(),
            config.narrative.model.clone(),
            config.narrative.max_tokens,
            config.narrative.temperature,
            config.narrative.timeout(),
        )?),
        None => {
            warn!("OPENAI_API_KEY not set, decisions will use the fallback narrative");
            Arc::new(OfflineJustifier)
        }
    };

    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimClient::new(
        config.geocoding.base_url.clone(),
        config.geocoding.limit,
        config.geocoding.timeout(),
    )?);

    let state = AppState::new(store, narrator, geocoder, &config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr()))?;
    info!(addr = %config.server.bind_addr(), "CityDispatch API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    info!("CityDispatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
