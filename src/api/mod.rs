// HTTP API: incidents, dispatch, agents, stats, history, address search

mod agents;
mod error;
mod health;
mod history;
mod incidents;
mod search;
mod stats;

pub use error::ApiError;

use crate::config::DispatchConfig;
use crate::dispatch::Dispatcher;
use crate::geocode::Geocoder;
use crate::narrative::JustificationProvider;
use crate::store::Store;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub dispatcher: Arc<Dispatcher>,
    pub geocoder: Arc<dyn Geocoder>,
    /// Dispatch inside `POST /incidents`
    pub inline_dispatch: bool,
    /// Recompute agent efficiency on `GET /stats`
    pub refresh_stats: bool,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        narrator: Arc<dyn JustificationProvider>,
        geocoder: Arc<dyn Geocoder>,
        config: &DispatchConfig,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            narrator,
            config.dispatch.base_response_minutes,
        ));
        Self {
            store,
            dispatcher,
            geocoder,
            inline_dispatch: config.dispatch.inline_on_create,
            refresh_stats: config.stats.refresh_efficiency,
        }
    }
}

/// Create the API router with every endpoint and a permissive CORS layer
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::routes())
        .merge(incidents::routes())
        .merge(agents::routes())
        .merge(stats::routes())
        .merge(history::routes())
        .merge(search::routes())
        .with_state(Arc::new(state))
        .layer(cors)
}
