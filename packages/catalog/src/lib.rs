// ABOUTME: Agent module discovery and catalog registry
// ABOUTME: Scans a module tree for agent manifests and serves immutable catalog snapshots

pub mod introspector;
pub mod registry;
pub mod types;

pub use introspector::{scan, CatalogError, ENTRY_FILE};
pub use registry::{CatalogRegistry, GroupMode, SharedCatalog};
pub use types::{CatalogEntry, OutputSchema, ParamSpec, ParamType, SchemaField, UiHint};
