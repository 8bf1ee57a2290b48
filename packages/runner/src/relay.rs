// ABOUTME: Relays native provider fragments into ordered RunEvents on the run's channel
// ABOUTME: Enforces exactly one terminal event, the idle timeout and cancellation on receiver drop

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

use agentdeck_providers::FragmentStream;

use crate::metrics;
use crate::types::RunEvent;

/// Identity of the run as far as metrics are concerned.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub provider_id: String,
    pub model: String,
}

pub struct StreamRelay {
    idle_timeout: Duration,
}

impl StreamRelay {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }

    /// Consumes the native stream to completion, forwarding chunks in arrival
    /// order and finishing with exactly one terminal event.
    ///
    /// Returning drops `native`, which closes the underlying provider
    /// session; a failed send means the caller disconnected and the run is
    /// cancelled without further events.
    pub async fn run(
        &self,
        ctx: RunContext,
        mut native: FragmentStream,
        tx: mpsc::Sender<RunEvent>,
    ) {
        let started = Instant::now();
        let mut content = String::new();
        let mut input_tokens = 0u64;
        let mut output_tokens = 0u64;

        loop {
            let next = match timeout(self.idle_timeout, native.next()).await {
                Ok(item) => item,
                Err(_) => {
                    let _ = tx
                        .send(RunEvent::Error {
                            message: format!(
                                "run stalled: no output for {}s",
                                self.idle_timeout.as_secs()
                            ),
                        })
                        .await;
                    return;
                }
            };

            match next {
                Some(Ok(fragment)) => {
                    if let Some(usage) = fragment.usage {
                        // Usage frames repeat with growing counts.
                        input_tokens = input_tokens.max(usage.prompt_tokens);
                        output_tokens = output_tokens.max(usage.completion_tokens);
                    }
                    if let Some(text) = fragment.content {
                        content.push_str(&text);
                        if tx.send(RunEvent::Chunk { content: text }).await.is_err() {
                            debug!(
                                provider = %ctx.provider_id,
                                "run receiver dropped, stopping stream consumption"
                            );
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    let _ = tx
                        .send(RunEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                    return;
                }
                None => {
                    let final_metrics = metrics::reconcile(
                        &ctx.provider_id,
                        &ctx.model,
                        &content,
                        started.elapsed(),
                        input_tokens,
                        output_tokens,
                    );
                    let _ = tx
                        .send(RunEvent::Complete {
                            content,
                            metrics: final_metrics,
                        })
                        .await;
                    return;
                }
            }
        }
    }
}
