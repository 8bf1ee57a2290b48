// ABOUTME: Streaming execution engine for catalog modules
// ABOUTME: Validates run requests, relays native output as ordered events and reconciles metrics

pub mod coordinator;
pub mod metrics;
pub mod relay;
pub mod types;

pub use coordinator::{ExecuteError, Execution, ExecutionCoordinator};
pub use metrics::{estimate_tokens, CHARS_PER_TOKEN};
pub use relay::{RunContext, StreamRelay};
pub use types::{Metrics, RunEvent, RunRequest};
