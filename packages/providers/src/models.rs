// ABOUTME: Per-provider model list cache with TTL, stale-on-error reads and forced reload
// ABOUTME: Fetches happen outside the lock so readers keep serving the previous snapshot

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::registry::{ProviderDef, ProviderError, ProviderRegistry};

/// Result of a model list lookup. `stale` is set when a fetch failed and the
/// last good cached list was served instead.
#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub provider_id: String,
    pub models: Vec<String>,
    pub stale: bool,
}

struct CacheEntry {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Fetches the usable model identifiers from a provider's discovery endpoint.
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    async fn fetch(&self, def: &ProviderDef) -> Result<Vec<String>, ProviderError>;
}

pub struct ModelCache {
    registry: Arc<ProviderRegistry>,
    fetcher: Arc<dyn ModelFetcher>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl ModelCache {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        fetcher: Arc<dyn ModelFetcher>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            fetcher,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached model list if fresh, otherwise refetches. A failed
    /// fetch falls back to the last good list (flagged stale) when one exists.
    pub async fn get_models(&self, provider_id: &str) -> Result<ModelList, ProviderError> {
        let def = self.registry.get(provider_id)?;

        if let Some(entry) = self.entry(provider_id).await {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(provider = provider_id, "serving model list from cache");
                return Ok(ModelList {
                    provider_id: provider_id.to_string(),
                    models: entry.models.clone(),
                    stale: false,
                });
            }
        }

        let started = Instant::now();
        match self.fetcher.fetch(def).await {
            Ok(models) => {
                self.insert(provider_id, models.clone(), started).await;
                info!(provider = provider_id, count = models.len(), "model list refreshed");
                Ok(ModelList {
                    provider_id: provider_id.to_string(),
                    models,
                    stale: false,
                })
            }
            Err(err) => {
                if let Some(entry) = self.entry(provider_id).await {
                    warn!(
                        provider = provider_id,
                        error = %err,
                        "model list fetch failed, serving stale cache"
                    );
                    return Ok(ModelList {
                        provider_id: provider_id.to_string(),
                        models: entry.models.clone(),
                        stale: true,
                    });
                }
                Err(ProviderError::Unavailable(format!("{provider_id}: {err}")))
            }
        }
    }

    /// Unconditionally invalidates and refetches one provider's list.
    pub async fn reload(&self, provider_id: &str) -> Result<ModelList, ProviderError> {
        let def = self.registry.get(provider_id)?;
        let started = Instant::now();
        let models = self
            .fetcher
            .fetch(def)
            .await
            .map_err(|err| ProviderError::Unavailable(format!("{provider_id}: {err}")))?;
        self.insert(provider_id, models.clone(), started).await;
        info!(provider = provider_id, count = models.len(), "model list reloaded");
        Ok(ModelList {
            provider_id: provider_id.to_string(),
            models,
            stale: false,
        })
    }

    /// Drops every cached entry; the next read per provider refetches.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("model list cache cleared");
    }

    async fn entry(&self, provider_id: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().await.get(provider_id).cloned()
    }

    async fn insert(&self, provider_id: &str, models: Vec<String>, fetched_at: Instant) {
        let mut entries = self.entries.write().await;
        // Never regress to a fetch that started earlier than the one cached.
        if let Some(existing) = entries.get(provider_id) {
            if existing.fetched_at > fetched_at {
                return;
            }
        }
        entries.insert(
            provider_id.to_string(),
            Arc::new(CacheEntry { models, fetched_at }),
        );
    }
}

/// Production fetcher: `GET {base_url}/models` with a bearer credential when
/// one is configured, parsed as an OpenAI-compatible model list.
pub struct HttpModelFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    data: Vec<ModelId>,
}

#[derive(Debug, Deserialize)]
struct ModelId {
    id: String,
}

impl HttpModelFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpModelFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelFetcher for HttpModelFetcher {
    async fn fetch(&self, def: &ProviderDef) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", def.base_url);
        let mut request = self.client.get(&url);
        if let Ok(key) = env::var(def.api_key_env) {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let body: ModelListResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(body.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Capability;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_PROVIDERS: &[ProviderDef] = &[ProviderDef {
        id: "demo",
        name: "Demo",
        description: "Test provider",
        api_key_env: "DEMO_API_KEY",
        base_url: "http://demo.invalid/v1",
        default_model: "demo-1",
        capabilities: &[Capability::Streaming],
        warning: None,
    }];

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ModelFetcher for CountingFetcher {
        async fn fetch(&self, _def: &ProviderDef) -> Result<Vec<String>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Upstream("boom".to_string()));
            }
            Ok(vec![format!("demo-model-{call}")])
        }
    }

    fn cache(fetcher: Arc<CountingFetcher>, ttl: Duration) -> ModelCache {
        ModelCache::new(
            Arc::new(ProviderRegistry::with_defs(TEST_PROVIDERS)),
            fetcher,
            ttl,
        )
    }

    #[tokio::test]
    async fn second_read_within_ttl_hits_cache() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher.clone(), Duration::from_secs(300));

        let first = cache.get_models("demo").await.unwrap();
        let second = cache.get_models("demo").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.models, second.models);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn expired_entry_triggers_refetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher.clone(), Duration::ZERO);

        cache.get_models("demo").await.unwrap();
        let second = cache.get_models("demo").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.models, vec!["demo-model-2"]);
    }

    #[tokio::test]
    async fn fetch_failure_serves_stale_list() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher.clone(), Duration::ZERO);

        let fresh = cache.get_models("demo").await.unwrap();
        fetcher.fail.store(true, Ordering::SeqCst);
        let stale = cache.get_models("demo").await.unwrap();

        assert!(stale.stale);
        assert_eq!(stale.models, fresh.models);
    }

    #[tokio::test]
    async fn fetch_failure_with_empty_cache_is_unavailable() {
        let fetcher = Arc::new(CountingFetcher::new());
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = cache(fetcher, Duration::from_secs(300));

        let err = cache.get_models("demo").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn reload_bypasses_ttl() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher.clone(), Duration::from_secs(300));

        cache.get_models("demo").await.unwrap();
        let reloaded = cache.reload("demo").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reloaded.models, vec!["demo-model-2"]);

        // The reloaded list is now the cached one.
        let cached = cache.get_models("demo").await.unwrap();
        assert_eq!(cached.models, vec!["demo-model-2"]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_next_read_to_fetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher.clone(), Duration::from_secs(300));

        cache.get_models("demo").await.unwrap();
        cache.clear().await;
        cache.get_models("demo").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = cache(fetcher, Duration::from_secs(300));

        let err = cache.get_models("missing").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
