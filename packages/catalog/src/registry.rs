// ABOUTME: In-memory catalog registry with grouping queries and atomic snapshot swap
// ABOUTME: Registries are immutable after construction; a rescan replaces the whole instance

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::introspector::{scan, CatalogError};
use crate::types::CatalogEntry;

/// How to bucket entries for a grouped listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMode {
    /// Bucket by the module's directory path.
    Path,
    /// Bucket by declared category.
    Category,
    /// Bucket by capability tag; an entry with N tags appears in N buckets.
    Tool,
    /// Single bucket, sorted by entry name.
    Alphabetical,
    /// Single bucket of entries matching a case-insensitive substring of
    /// name or description.
    Filter(String),
}

/// Immutable snapshot of all discovered catalog entries.
pub struct CatalogRegistry {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
}

impl CatalogRegistry {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.id.clone(), idx))
            .collect();
        Self { entries, by_id }
    }

    /// Builds a registry by scanning the module tree at `root`.
    pub fn scan(root: &Path) -> Result<Self, CatalogError> {
        Ok(Self::new(scan(root)?))
    }

    pub fn list(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group_by(&self, mode: &GroupMode) -> BTreeMap<String, Vec<&CatalogEntry>> {
        let mut buckets: BTreeMap<String, Vec<&CatalogEntry>> = BTreeMap::new();
        match mode {
            GroupMode::Path => {
                for entry in &self.entries {
                    let parent = entry.path_parts[..entry.path_parts.len().saturating_sub(1)]
                        .join("/");
                    let key = if parent.is_empty() {
                        ".".to_string()
                    } else {
                        parent
                    };
                    buckets.entry(key).or_default().push(entry);
                }
            }
            GroupMode::Category => {
                for entry in &self.entries {
                    buckets.entry(entry.category.clone()).or_default().push(entry);
                }
            }
            GroupMode::Tool => {
                for entry in &self.entries {
                    if entry.tools.is_empty() {
                        buckets.entry("untagged".to_string()).or_default().push(entry);
                    }
                    for tag in &entry.tools {
                        buckets.entry(tag.clone()).or_default().push(entry);
                    }
                }
            }
            GroupMode::Alphabetical => {
                let mut all: Vec<&CatalogEntry> = self.entries.iter().collect();
                all.sort_by(|a, b| a.name.cmp(&b.name));
                buckets.insert("all".to_string(), all);
            }
            GroupMode::Filter(needle) => {
                let needle = needle.to_lowercase();
                let matches: Vec<&CatalogEntry> = self
                    .entries
                    .iter()
                    .filter(|entry| {
                        entry.name.to_lowercase().contains(&needle)
                            || entry.description.to_lowercase().contains(&needle)
                    })
                    .collect();
                buckets.insert("matches".to_string(), matches);
            }
        }
        buckets
    }
}

/// Shared handle to the current catalog snapshot.
///
/// Readers clone the inner Arc and keep serving the snapshot they loaded; a
/// rescan swaps in a complete replacement, so a half-built catalog is never
/// visible.
pub struct SharedCatalog {
    inner: RwLock<Arc<CatalogRegistry>>,
}

impl SharedCatalog {
    pub fn new(registry: CatalogRegistry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn load(&self) -> Arc<CatalogRegistry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, registry: CatalogRegistry) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(registry);
    }
}
