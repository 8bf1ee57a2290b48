// ABOUTME: The streaming run endpoint: RunRequest in, ordered SSE run events out
// ABOUTME: Client disconnect drops the event receiver, which cancels the underlying run

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use tracing::info;

use agentdeck_runner::RunRequest;

use crate::response::ApiError;
use crate::AppState;

/// Launches a run and relays its events as SSE.
///
/// Unknown agent or provider ids fail with a plain 404 before any stream
/// bytes are written; everything later arrives as in-stream events. A
/// capability mismatch is surfaced as a leading advisory `warning` event that
/// older clients can ignore.
pub async fn run(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    info!(agent = %request.agent_id, provider = %request.provider, "run requested");
    let execution = state.coordinator.execute(request).await?;

    let warning = execution.warning;
    let mut events = execution.events;
    let stream = async_stream::stream! {
        if let Some(message) = warning {
            yield Event::default().json_data(json!({
                "event": "warning",
                "message": message,
            }));
        }
        while let Some(event) = events.recv().await {
            yield Event::default().json_data(&event);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
