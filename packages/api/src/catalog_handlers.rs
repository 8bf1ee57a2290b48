// ABOUTME: Catalog endpoints: listing with grouping, on-demand rescan and manifest pass-through
// ABOUTME: Every response serves from an immutable snapshot; rescan swaps the whole registry

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use agentdeck_catalog::{CatalogEntry, CatalogRegistry, GroupMode};

use crate::response::{ApiError, ApiResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CatalogListing {
    Flat(Vec<CatalogEntry>),
    Grouped(BTreeMap<String, Vec<CatalogEntry>>),
}

pub async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({ "status": "ok" })))
}

/// Lists the catalog, flat by default or grouped when asked.
pub async fn list_catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<CatalogListing>>, ApiError> {
    let registry = state.catalog.load();

    let mode = match (query.group.as_deref(), query.filter) {
        (None, None) => {
            return Ok(Json(ApiResponse::success(CatalogListing::Flat(
                registry.list().to_vec(),
            ))));
        }
        (None, Some(needle)) | (Some("filter"), Some(needle)) => GroupMode::Filter(needle),
        (Some("path"), _) => GroupMode::Path,
        (Some("category"), _) => GroupMode::Category,
        (Some("tool"), _) => GroupMode::Tool,
        (Some("alphabetical"), _) => GroupMode::Alphabetical,
        (Some(other), _) => {
            return Err(ApiError::bad_request(format!("unknown group mode '{other}'")));
        }
    };

    let grouped = registry
        .group_by(&mode)
        .into_iter()
        .map(|(key, entries)| (key, entries.into_iter().cloned().collect()))
        .collect();
    Ok(Json(ApiResponse::success(CatalogListing::Grouped(grouped))))
}

/// Rebuilds the registry from disk and swaps it in atomically. In-flight
/// readers keep the snapshot they already hold.
pub async fn rescan_catalog(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let root = state.catalog_root.clone();
    let registry = tokio::task::spawn_blocking(move || CatalogRegistry::scan(&root))
        .await
        .map_err(|e| ApiError::internal(format!("rescan task failed: {e}")))??;

    let count = registry.len();
    state.catalog.replace(registry);
    info!(count, "catalog rescanned");
    Ok(Json(ApiResponse::success(json!({ "count": count }))))
}

/// Returns the raw manifest text of one module, for the dashboard's
/// source viewer.
pub async fn agent_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let registry = state.catalog.load();
    let entry = registry
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {id}")))?;

    let source = tokio::fs::read_to_string(&entry.source_path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to read manifest: {e}")))?;

    Ok(Json(ApiResponse::success(json!({
        "id": entry.id,
        "path": entry.source_path,
        "source": source,
    }))))
}
