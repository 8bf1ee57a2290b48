// ABOUTME: LLM provider registry, model list cache and streaming chat backend
// ABOUTME: Static provider definitions with live credential checks and TTL-cached model discovery

pub mod models;
pub mod pricing;
pub mod registry;
pub mod stream;

pub use models::{HttpModelFetcher, ModelCache, ModelFetcher, ModelList};
pub use registry::{Capability, Provider, ProviderDef, ProviderError, ProviderRegistry, PROVIDERS};
pub use stream::{AgentBackend, ChatRequest, Fragment, FragmentStream, OpenAiCompatBackend, Usage};
