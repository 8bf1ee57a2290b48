// ABOUTME: Agentdeck server entrypoint
// ABOUTME: Scans the catalog, wires the registries and cache and serves the dashboard API

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod config;

use agentdeck_api::{create_router, AppState};
use agentdeck_catalog::{CatalogError, CatalogRegistry, SharedCatalog};
use agentdeck_providers::{HttpModelFetcher, ModelCache, OpenAiCompatBackend, ProviderRegistry};
use agentdeck_runner::ExecutionCoordinator;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    // A missing catalog root starts the server with an empty catalog; a
    // rescan after creating it picks the modules up without a restart.
    let registry = match CatalogRegistry::scan(&config.catalog_root) {
        Ok(registry) => {
            info!(
                count = registry.len(),
                root = %config.catalog_root.display(),
                "catalog loaded"
            );
            registry
        }
        Err(CatalogError::RootNotFound(root)) => {
            warn!(root = %root.display(), "catalog root not found, starting empty");
            CatalogRegistry::new(Vec::new())
        }
        Err(err) => return Err(err.into()),
    };

    let catalog = Arc::new(SharedCatalog::new(registry));
    let providers = Arc::new(ProviderRegistry::new());
    let models = Arc::new(ModelCache::new(
        providers.clone(),
        Arc::new(HttpModelFetcher::new()),
        config.model_cache_ttl,
    ));
    let coordinator = Arc::new(ExecutionCoordinator::new(
        catalog.clone(),
        providers.clone(),
        Arc::new(OpenAiCompatBackend::new()),
        config.run_idle_timeout,
    ));

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<axum::http::HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = create_router(AppState {
        catalog,
        catalog_root: config.catalog_root.clone(),
        providers,
        models,
        coordinator,
    })
    .layer(cors)
    .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "agentdeck server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
