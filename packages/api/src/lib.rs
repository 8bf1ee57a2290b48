// ABOUTME: Axum router and shared state for the Agentdeck dashboard API
// ABOUTME: Wires the catalog, provider registry, model cache and execution coordinator

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use agentdeck_catalog::SharedCatalog;
use agentdeck_providers::{ModelCache, ProviderRegistry};
use agentdeck_runner::ExecutionCoordinator;

pub mod catalog_handlers;
pub mod provider_handlers;
pub mod response;
pub mod run_handlers;

pub use response::{ApiError, ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<SharedCatalog>,
    /// Root the rescan endpoint re-walks.
    pub catalog_root: PathBuf,
    pub providers: Arc<ProviderRegistry>,
    pub models: Arc<ModelCache>,
    pub coordinator: Arc<ExecutionCoordinator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(catalog_handlers::health))
        .route("/api/catalog", get(catalog_handlers::list_catalog))
        .route("/api/catalog/rescan", post(catalog_handlers::rescan_catalog))
        .route("/api/agents/{id}/source", get(catalog_handlers::agent_source))
        .route("/api/providers", get(provider_handlers::list_providers))
        .route("/api/models/reload", get(provider_handlers::reload_models))
        .route("/api/models/{provider_id}", get(provider_handlers::list_models))
        .route("/api/run", post(run_handlers::run))
        .with_state(state)
}
