// ABOUTME: Wire types for run requests, streamed run events and final metrics
// ABOUTME: RunEvent serializes with an `event` discriminant matching the SSE protocol

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A request to execute one catalog module.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub agent_id: String,
    pub provider: String,
    /// Falls back to the provider's default model when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Final performance accounting for a completed run. `estimated` is true when
/// tokens or cost came from the character-based fallback rather than real
/// upstream metering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub duration_seconds: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tokens_per_second: f64,
    pub cost_usd: f64,
    pub estimated: bool,
}

/// One event in a run's output stream: zero or more chunks followed by
/// exactly one terminal complete/error, never anything after the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RunEvent {
    Chunk { content: String },
    Complete { content: String, metrics: Metrics },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_event_serializes_with_event_discriminant() {
        let chunk = RunEvent::Chunk {
            content: "Hel".to_string(),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["event"], "chunk");
        assert_eq!(json["content"], "Hel");

        let error = RunEvent::Error {
            message: "boom".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["event"], "error");
    }

    #[test]
    fn run_request_defaults() {
        let request: RunRequest =
            serde_json::from_str(r#"{"agent_id":"a","provider":"openai"}"#).unwrap();
        assert_eq!(request.temperature, 0.7);
        assert!(request.model.is_none());
        assert!(request.params.is_empty());
    }
}
