// ABOUTME: Resolves run requests against the catalog, validates params and launches streaming runs
// ABOUTME: Each run is an independent task owning exactly one backend session

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use agentdeck_catalog::{CatalogEntry, ParamSpec, ParamType, SharedCatalog};
use agentdeck_providers::{AgentBackend, ChatRequest, ProviderRegistry};

use crate::relay::{RunContext, StreamRelay};
use crate::types::{RunEvent, RunRequest};

/// Buffered events per run; a slow consumer applies backpressure to the relay.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Prompt used when a module declares no positional input and none is given.
const FALLBACK_PROMPT: &str = "Hello!";

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
}

/// A launched (or fast-failed) run: an optional capability warning to surface
/// before any output, and the ordered event stream.
#[derive(Debug)]
pub struct Execution {
    pub warning: Option<String>,
    pub events: mpsc::Receiver<RunEvent>,
}

pub struct ExecutionCoordinator {
    catalog: Arc<SharedCatalog>,
    providers: Arc<ProviderRegistry>,
    backend: Arc<dyn AgentBackend>,
    idle_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(
        catalog: Arc<SharedCatalog>,
        providers: Arc<ProviderRegistry>,
        backend: Arc<dyn AgentBackend>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            providers,
            backend,
            idle_timeout,
        }
    }

    /// Resolves and launches one run.
    ///
    /// Unknown agent or provider ids fail synchronously, before a stream
    /// exists. Parameter validation failures produce a stream whose sole
    /// event is an error. Everything later (backend failures, stalls) arrives
    /// as the stream's terminal event.
    pub async fn execute(&self, request: RunRequest) -> Result<Execution, ExecuteError> {
        let registry = self.catalog.load();
        let entry = registry
            .get(&request.agent_id)
            .cloned()
            .ok_or_else(|| ExecuteError::AgentNotFound(request.agent_id.clone()))?;
        let def = self
            .providers
            .get(&request.provider)
            .map_err(|_| ExecuteError::ProviderNotFound(request.provider.clone()))?;

        let warning = self.providers.capability_warning(def, &entry.tools);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        if let Err(message) = validate_params(&entry.params, &request) {
            info!(agent = %entry.id, "run rejected: {message}");
            let _ = tx.send(RunEvent::Error { message }).await;
            return Ok(Execution { warning, events: rx });
        }

        let model = request
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| def.default_model.to_string());
        let chat = build_chat_request(&entry, &request, &model);
        let ctx = RunContext {
            provider_id: def.id.to_string(),
            model,
        };

        info!(
            agent = %entry.id,
            provider = def.id,
            model = %ctx.model,
            "launching run"
        );

        let backend = self.backend.clone();
        let relay = StreamRelay::new(self.idle_timeout);
        tokio::spawn(async move {
            match backend.start(def, chat).await {
                Ok(native) => relay.run(ctx, native, tx).await,
                Err(err) => {
                    error!(provider = def.id, error = %err, "failed to start run");
                    let _ = tx
                        .send(RunEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                }
            }
        });

        Ok(Execution { warning, events: rx })
    }
}

/// Fails fast on missing required parameters and values that do not parse as
/// their declared type. Collects every problem into one message.
fn validate_params(specs: &[ParamSpec], request: &RunRequest) -> Result<(), String> {
    let mut problems = Vec::new();

    for spec in specs {
        let supplied = request
            .params
            .get(&spec.name)
            .map(String::as_str)
            .filter(|v| !v.is_empty());

        match supplied {
            None => {
                if spec.required && spec.default.is_empty() {
                    problems.push(format!("missing required parameter '{}'", spec.name));
                }
            }
            Some(value) => {
                let type_ok = match spec.param_type {
                    ParamType::String => true,
                    ParamType::Integer => value.parse::<i64>().is_ok(),
                    ParamType::Float => value.parse::<f64>().is_ok(),
                    ParamType::Boolean => value.parse::<bool>().is_ok(),
                };
                if !type_ok {
                    problems.push(format!(
                        "parameter '{}' expects {}, got '{value}'",
                        spec.name,
                        type_name(spec.param_type)
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

fn type_name(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "a string",
        ParamType::Integer => "an integer",
        ParamType::Float => "a number",
        ParamType::Boolean => "a boolean",
    }
}

/// Binds parameter values into the chat invocation: the positional param
/// becomes the user prompt, remaining non-empty params are appended as
/// `name: value` context lines, instructions become the system prompt.
fn build_chat_request(entry: &CatalogEntry, request: &RunRequest, model: &str) -> ChatRequest {
    let mut prompt = String::new();
    let mut context_lines = Vec::new();

    for spec in &entry.params {
        let value = request
            .params
            .get(&spec.name)
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| (!spec.default.is_empty()).then(|| spec.default.clone()));
        let Some(value) = value else { continue };

        if spec.is_positional {
            prompt = value;
        } else {
            context_lines.push(format!("{}: {}", spec.name, value));
        }
    }

    if prompt.is_empty() {
        prompt = FALLBACK_PROMPT.to_string();
    }
    if !context_lines.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&context_lines.join("\n"));
    }

    ChatRequest {
        model: model.to_string(),
        temperature: request.temperature,
        system: entry.instructions.join("\n"),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::StreamExt;

    use agentdeck_catalog::{CatalogRegistry, UiHint};
    use agentdeck_providers::{
        Capability, Fragment, FragmentStream, ProviderDef, ProviderError, Usage,
    };

    use crate::metrics::estimate_tokens;

    static TEST_PROVIDERS: &[ProviderDef] = &[
        ProviderDef {
            id: "openai",
            name: "OpenAI",
            description: "test",
            api_key_env: "TEST_OPENAI_KEY",
            base_url: "http://openai.invalid/v1",
            default_model: "gpt-4o",
            capabilities: &[Capability::Tools, Capability::Streaming],
            warning: None,
        },
        ProviderDef {
            id: "demo",
            name: "Demo",
            description: "test provider without tool support",
            api_key_env: "TEST_DEMO_KEY",
            base_url: "http://demo.invalid/v1",
            default_model: "demo-1",
            capabilities: &[Capability::Streaming],
            warning: None,
        },
    ];

    enum Script {
        /// Yield these text fragments, then a final usage frame, then end.
        Complete { fragments: Vec<&'static str>, usage: Usage },
        /// Yield these text fragments, then fail.
        Fail { fragments: Vec<&'static str>, message: &'static str },
        /// Never yield anything.
        Stall,
        /// Yield fragments forever, counting each one.
        Endless { yielded: Arc<AtomicUsize> },
    }

    struct FakeBackend {
        script: Script,
    }

    #[async_trait]
    impl AgentBackend for FakeBackend {
        async fn start(
            &self,
            _def: &'static ProviderDef,
            _request: ChatRequest,
        ) -> Result<FragmentStream, ProviderError> {
            match &self.script {
                Script::Complete { fragments, usage } => {
                    let mut items: Vec<Result<Fragment, ProviderError>> = fragments
                        .iter()
                        .map(|text| {
                            Ok(Fragment {
                                content: Some(text.to_string()),
                                usage: None,
                            })
                        })
                        .collect();
                    items.push(Ok(Fragment {
                        content: None,
                        usage: Some(*usage),
                    }));
                    Ok(futures::stream::iter(items).boxed())
                }
                Script::Fail { fragments, message } => {
                    let mut items: Vec<Result<Fragment, ProviderError>> = fragments
                        .iter()
                        .map(|text| {
                            Ok(Fragment {
                                content: Some(text.to_string()),
                                usage: None,
                            })
                        })
                        .collect();
                    items.push(Err(ProviderError::Upstream(message.to_string())));
                    Ok(futures::stream::iter(items).boxed())
                }
                Script::Stall => Ok(futures::stream::pending().boxed()),
                Script::Endless { yielded } => {
                    let yielded = yielded.clone();
                    let stream = futures::stream::unfold(yielded, |yielded| async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        yielded.fetch_add(1, Ordering::SeqCst);
                        let fragment = Fragment {
                            content: Some("x".to_string()),
                            usage: None,
                        };
                        Some((Ok(fragment), yielded))
                    });
                    Ok(stream.boxed())
                }
            }
        }
    }

    fn echo_entry(tools: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id: "echo".to_string(),
            name: "Echo".to_string(),
            category: "General".to_string(),
            subcategory: None,
            description: "echoes its input".to_string(),
            path_parts: vec!["echo".to_string()],
            params: vec![
                ParamSpec {
                    name: "text".to_string(),
                    param_type: ParamType::String,
                    required: true,
                    is_positional: true,
                    default: String::new(),
                    description: String::new(),
                    ui_hint: UiHint::Textarea,
                },
                ParamSpec {
                    name: "repeat".to_string(),
                    param_type: ParamType::Integer,
                    required: false,
                    is_positional: false,
                    default: "1".to_string(),
                    description: String::new(),
                    ui_hint: UiHint::Number,
                },
            ],
            tools: tools.iter().map(|t| t.to_string()).collect(),
            patterns: Vec::new(),
            output_schemas: Vec::new(),
            instructions: vec!["You are an echo agent.".to_string()],
            source_path: PathBuf::from("/catalog/echo/agent.toml"),
        }
    }

    fn coordinator(entry: CatalogEntry, script: Script, idle: Duration) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            Arc::new(SharedCatalog::new(CatalogRegistry::new(vec![entry]))),
            Arc::new(ProviderRegistry::with_defs(TEST_PROVIDERS)),
            Arc::new(FakeBackend { script }),
            idle,
        )
    }

    fn request(agent_id: &str, provider: &str, params: &[(&str, &str)]) -> RunRequest {
        RunRequest {
            agent_id: agent_id.to_string(),
            provider: provider.to_string(),
            model: None,
            temperature: 0.7,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    async fn collect(mut execution: Execution) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = execution.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn unknown_agent_fails_before_streaming() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete { fragments: vec![], usage: Usage::default() },
            Duration::from_secs(5),
        );
        let err = coordinator
            .execute(request("missing", "openai", &[("text", "hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_provider_fails_before_streaming() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete { fragments: vec![], usage: Usage::default() },
            Duration::from_secs(5),
        );
        let err = coordinator
            .execute(request("echo", "nope", &[("text", "hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::ProviderNotFound(_)));
    }

    #[tokio::test]
    async fn missing_required_param_yields_single_error_event() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete { fragments: vec!["never"], usage: Usage::default() },
            Duration::from_secs(5),
        );
        let execution = coordinator.execute(request("echo", "openai", &[])).await.unwrap();
        let events = collect(execution).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            RunEvent::Error { message } => assert!(message.contains("text"), "{message}"),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_typed_param_yields_single_error_event() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete { fragments: vec!["never"], usage: Usage::default() },
            Duration::from_secs(5),
        );
        let execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi"), ("repeat", "lots")]))
            .await
            .unwrap();
        let events = collect(execution).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            RunEvent::Error { message } => {
                assert!(message.contains("repeat"), "{message}");
                assert!(message.contains("integer"), "{message}");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_run_emits_chunks_then_one_complete() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete {
                fragments: vec!["Hel", "lo"],
                usage: Usage { prompt_tokens: 12, completion_tokens: 7 },
            },
            Duration::from_secs(5),
        );
        let execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi")]))
            .await
            .unwrap();
        assert!(execution.warning.is_none());
        let events = collect(execution).await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], RunEvent::Chunk { content: "Hel".to_string() });
        assert_eq!(events[1], RunEvent::Chunk { content: "lo".to_string() });
        match &events[2] {
            RunEvent::Complete { content, metrics } => {
                assert_eq!(content, "Hello");
                assert_eq!(metrics.output_tokens, 7);
                assert_eq!(metrics.input_tokens, 12);
                assert!(!metrics.estimated);
            }
            other => panic!("expected complete event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_usage_falls_back_to_estimated_tokens() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Complete {
                fragments: vec!["Hel", "lo"],
                usage: Usage { prompt_tokens: 0, completion_tokens: 0 },
            },
            Duration::from_secs(5),
        );
        let execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi")]))
            .await
            .unwrap();
        let events = collect(execution).await;

        match events.last().unwrap() {
            RunEvent::Complete { metrics, .. } => {
                assert!(metrics.estimated);
                assert_eq!(metrics.output_tokens, estimate_tokens("Hello"));
            }
            other => panic!("expected complete event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_with_single_error() {
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Fail { fragments: vec!["partial "], message: "upstream exploded" },
            Duration::from_secs(5),
        );
        let execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi")]))
            .await
            .unwrap();
        let events = collect(execution).await;

        // Delivered chunks are preserved, then exactly one terminal error.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RunEvent::Chunk { content: "partial ".to_string() });
        match &events[1] {
            RunEvent::Error { message } => assert!(message.contains("upstream exploded")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_run_times_out_with_error_event() {
        let coordinator = coordinator(echo_entry(&[]), Script::Stall, Duration::from_millis(50));
        let execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi")]))
            .await
            .unwrap();
        let events = collect(execution).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            RunEvent::Error { message } => assert!(message.contains("stalled"), "{message}"),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn capability_mismatch_warns_but_run_completes() {
        let coordinator = coordinator(
            echo_entry(&["web"]),
            Script::Complete {
                fragments: vec!["done"],
                usage: Usage { prompt_tokens: 1, completion_tokens: 1 },
            },
            Duration::from_secs(5),
        );
        let execution = coordinator
            .execute(request("echo", "demo", &[("text", "hi")]))
            .await
            .unwrap();

        let warning = execution.warning.clone().expect("expected warning");
        assert!(warning.contains("demo"));
        assert!(warning.contains("web"));

        let events = collect(execution).await;
        assert!(matches!(events.last(), Some(RunEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn dropping_receiver_cancels_consumption() {
        let yielded = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(
            echo_entry(&[]),
            Script::Endless { yielded: yielded.clone() },
            Duration::from_secs(5),
        );
        let mut execution = coordinator
            .execute(request("echo", "openai", &[("text", "hi")]))
            .await
            .unwrap();

        // Take one chunk, then disconnect.
        let first = execution.events.recv().await;
        assert!(matches!(first, Some(RunEvent::Chunk { .. })));
        drop(execution);

        // The relay notices the closed channel and stops pulling fragments.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let after_drop = yielded.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(yielded.load(Ordering::SeqCst), after_drop);
    }

    #[test]
    fn prompt_binding_uses_positional_and_context_lines() {
        let entry = echo_entry(&[]);
        let request = request("echo", "openai", &[("text", "What is Rust?"), ("repeat", "2")]);
        let chat = build_chat_request(&entry, &request, "gpt-4o");

        assert_eq!(chat.system, "You are an echo agent.");
        assert!(chat.prompt.starts_with("What is Rust?"));
        assert!(chat.prompt.contains("repeat: 2"));
    }

    #[test]
    fn prompt_binding_falls_back_to_defaults() {
        let mut entry = echo_entry(&[]);
        entry.params[0].required = false;
        entry.params[0].default = "Hi there".to_string();
        let request = request("echo", "openai", &[]);
        let chat = build_chat_request(&entry, &request, "gpt-4o");

        assert!(chat.prompt.starts_with("Hi there"));
        assert!(chat.prompt.contains("repeat: 1"));
    }
}
