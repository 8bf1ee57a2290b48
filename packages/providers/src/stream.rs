// ABOUTME: Streaming chat backend over OpenAI-compatible provider endpoints
// ABOUTME: Parses provider SSE frames into content/usage fragments consumed by the runner

use std::env;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::registry::{ProviderDef, ProviderError};

/// Token usage as reported by the provider. Frames may repeat with growing
/// counts, so consumers keep the running max.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// One unit of native streaming output: a content delta, a usage report,
/// or both.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub content: Option<String>,
    pub usage: Option<Usage>,
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, ProviderError>> + Send>>;

/// A fully bound chat invocation for one run.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub system: String,
    pub prompt: String,
}

/// Seam between the execution coordinator and the provider wire protocol.
/// Tests substitute fakes; production uses [`OpenAiCompatBackend`].
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn start(
        &self,
        def: &'static ProviderDef,
        request: ChatRequest,
    ) -> Result<FragmentStream, ProviderError>;
}

/// Streaming chat client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn new() -> Self {
        // No overall request timeout: a streaming run legitimately stays open
        // for minutes. Stalls are handled by the runner's idle timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for OpenAiCompatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentBackend for OpenAiCompatBackend {
    async fn start(
        &self,
        def: &'static ProviderDef,
        request: ChatRequest,
    ) -> Result<FragmentStream, ProviderError> {
        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "stream": true,
            "stream_options": {"include_usage": true},
            "messages": messages,
        });

        let url = format!("{}/chat/completions", def.base_url);
        let mut http_request = self.client.post(&url).json(&body);
        if let Ok(key) = env::var(def.api_key_env) {
            if !key.is_empty() {
                http_request = http_request.bearer_auth(key);
            }
        }

        info!(provider = def.id, model = %request.model, "starting streaming chat request");
        let response = http_request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(provider = def.id, %status, "chat request rejected: {error_text}");
            return Err(ProviderError::Upstream(format!(
                "API returned {status}: {error_text}"
            )));
        }

        // Convert the response bytes into parsed fragments. Dropping the
        // returned stream drops the response and closes the connection.
        let stream = async_stream::stream! {
            use futures::StreamExt;
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Process complete SSE events
                        while let Some(event_end) = buffer.find("\n\n") {
                            let event = buffer[..event_end].to_string();
                            buffer = buffer[event_end + 2..].to_string();

                            for line in event.lines() {
                                let Some(data) = line.strip_prefix("data: ") else {
                                    continue;
                                };
                                if data.trim() == "[DONE]" {
                                    return;
                                }
                                let Ok(frame) = serde_json::from_str::<serde_json::Value>(data) else {
                                    // Unknown lines are ignorable noise.
                                    continue;
                                };
                                if let Some(message) = frame["error"]["message"].as_str() {
                                    yield Err(ProviderError::Upstream(message.to_string()));
                                    return;
                                }
                                let mut fragment = Fragment::default();
                                if let Some(text) = frame["choices"][0]["delta"]["content"].as_str() {
                                    if !text.is_empty() {
                                        fragment.content = Some(text.to_string());
                                    }
                                }
                                if frame["usage"].is_object() {
                                    fragment.usage =
                                        serde_json::from_value(frame["usage"].clone()).ok();
                                }
                                if fragment.content.is_some() || fragment.usage.is_some() {
                                    yield Ok(fragment);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::Request(e));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
