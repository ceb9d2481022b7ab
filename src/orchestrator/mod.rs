// ABOUTME: Pipeline orchestration: admission, the per-execution runner and rollback.
// ABOUTME: Each admitted execution runs as its own tokio task.

mod attempt;
mod error;
mod orchestrator;
mod rollback;
mod runner;

pub use error::{OrchestratorError, OrchestratorErrorKind};
pub use orchestrator::{Collaborators, ExecutionHandle, Orchestrator};
