// ABOUTME: Provider endpoints: the static provider list and the TTL-cached model lists
// ABOUTME: Reload invalidates one provider's cache entry, or all of them without a provider

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use agentdeck_providers::{ModelList, Provider};

use crate::response::{ApiError, ApiResponse};
use crate::AppState;

pub async fn list_providers(State(state): State<AppState>) -> Json<ApiResponse<Vec<Provider>>> {
    Json(ApiResponse::success(state.providers.list()))
}

/// Serves a provider's model list from the cache, fetching when stale or
/// absent. A failed refresh with a cached list returns it flagged `stale`.
pub async fn list_models(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> Result<Json<ApiResponse<ModelList>>, ApiError> {
    let models = state.models.get_models(&provider_id).await?;
    Ok(Json(ApiResponse::success(models)))
}

#[derive(Debug, Deserialize)]
pub struct ReloadQuery {
    #[serde(default)]
    provider: Option<String>,
}

/// Forces a cache refresh. With `?provider=` the named list is refetched and
/// returned; without it every entry is dropped and the next read refetches.
pub async fn reload_models(
    State(state): State<AppState>,
    Query(query): Query<ReloadQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    match query.provider {
        Some(provider_id) => {
            let models = state.models.reload(&provider_id).await?;
            Ok(Json(ApiResponse::success(json!({
                "reloaded": models.provider_id,
                "models": models.models,
            }))))
        }
        None => {
            state.models.clear().await;
            Ok(Json(ApiResponse::success(json!({ "cleared": true }))))
        }
    }
}
