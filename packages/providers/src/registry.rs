// ABOUTME: Static LLM provider definitions with live credential and capability checks
// ABOUTME: Active status is computed from the environment at call time, never cached

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not found: {0}")]
    NotFound(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Tools,
    StructuredOutput,
    Streaming,
    Vision,
}

/// Build-time definition of one supported provider. Immutable for the
/// process lifetime.
#[derive(Debug, Clone, Copy)]
pub struct ProviderDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Env var holding the credential; presence at call time means active.
    pub api_key_env: &'static str,
    /// OpenAI-compatible API root, used for model discovery and chat.
    pub base_url: &'static str,
    pub default_model: &'static str,
    pub capabilities: &'static [Capability],
    pub warning: Option<&'static str>,
}

const FULL: &[Capability] = &[
    Capability::Tools,
    Capability::StructuredOutput,
    Capability::Streaming,
    Capability::Vision,
];

pub static PROVIDERS: &[ProviderDef] = &[
    ProviderDef {
        id: "openrouter",
        name: "OpenRouter",
        description: "Multi-model access - Claude, GPT, Llama via OpenRouter",
        api_key_env: "OPENROUTER_API_KEY",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "anthropic/claude-haiku-4.5",
        capabilities: FULL,
        warning: None,
    },
    ProviderDef {
        id: "openai",
        name: "OpenAI",
        description: "OpenAI GPT models",
        api_key_env: "OPENAI_API_KEY",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o",
        capabilities: FULL,
        warning: None,
    },
    ProviderDef {
        id: "anthropic",
        name: "Anthropic",
        description: "Anthropic Claude models",
        api_key_env: "ANTHROPIC_API_KEY",
        base_url: "https://api.anthropic.com/v1",
        default_model: "claude-sonnet-4-5",
        capabilities: FULL,
        warning: None,
    },
    ProviderDef {
        id: "google",
        name: "Google",
        description: "Google Gemini models",
        api_key_env: "GOOGLE_AI_API_KEY",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        default_model: "gemini-2.5-flash",
        capabilities: FULL,
        warning: None,
    },
    ProviderDef {
        id: "cerebras",
        name: "Cerebras",
        description: "Ultra-fast inference (chat only, no tools)",
        api_key_env: "CEREBRAS_API_KEY",
        base_url: "https://api.cerebras.ai/v1",
        default_model: "llama-3.3-70b",
        capabilities: &[Capability::Streaming],
        warning: Some("Cerebras only supports basic chat. Agents with tools will fail."),
    },
    ProviderDef {
        id: "groq",
        name: "Groq",
        description: "Fast inference via Groq",
        api_key_env: "GROQ_API_KEY",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.3-70b-versatile",
        capabilities: &[Capability::Tools, Capability::Streaming],
        warning: None,
    },
    ProviderDef {
        id: "ollama",
        name: "Ollama",
        description: "Local models via Ollama",
        api_key_env: "OLLAMA_HOST",
        base_url: "http://localhost:11434/v1",
        default_model: "llama3.2",
        capabilities: &[Capability::Tools, Capability::Streaming],
        warning: None,
    },
    ProviderDef {
        id: "huggingface",
        name: "HuggingFace",
        description: "Open-source models via HuggingFace",
        api_key_env: "HUGGINGFACE_API_KEY",
        base_url: "https://router.huggingface.co/v1",
        default_model: "meta-llama/Llama-3.3-70B-Instruct",
        capabilities: &[Capability::Streaming],
        warning: Some("Tool support varies by model. Basic chat recommended."),
    },
];

/// Wire representation of a provider with live availability.
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub default_model: String,
    pub capabilities: Vec<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct ProviderRegistry {
    defs: &'static [ProviderDef],
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { defs: PROVIDERS }
    }

    /// Registry over a custom provider table, for tests.
    pub fn with_defs(defs: &'static [ProviderDef]) -> Self {
        Self { defs }
    }

    /// Lists all providers. `is_active` reflects whether the credential env
    /// var is set right now; credentials may change without a restart.
    pub fn list(&self) -> Vec<Provider> {
        self.defs
            .iter()
            .map(|def| Provider {
                id: def.id.to_string(),
                name: def.name.to_string(),
                description: def.description.to_string(),
                is_active: credential_present(def),
                default_model: def.default_model.to_string(),
                capabilities: def.capabilities.to_vec(),
                warning: def.warning.map(str::to_string),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<&'static ProviderDef, ProviderError> {
        self.defs
            .iter()
            .find(|def| def.id == id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    /// Non-fatal capability mismatch check: a module that declares tools can
    /// still run on a provider without tool-calling, but the caller is told.
    pub fn capability_warning(&self, def: &ProviderDef, tools: &[String]) -> Option<String> {
        if tools.is_empty() || def.capabilities.contains(&Capability::Tools) {
            return None;
        }
        let mut message = format!(
            "provider '{}' has no tool-calling support but this module uses tools ({}); output may degrade",
            def.id,
            tools.join(", ")
        );
        if let Some(caveat) = def.warning {
            message.push_str(" - ");
            message.push_str(caveat);
        }
        Some(message)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn credential_present(def: &ProviderDef) -> bool {
    env::var(def.api_key_env).map(|v| !v.is_empty()).unwrap_or(false)
}
