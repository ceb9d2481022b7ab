// ABOUTME: Execution records: status, per-step results and the state machine guarding them.
// ABOUTME: Only the orchestrator mutates an execution; callers see cloned snapshots.

mod execution;
mod status;

pub use execution::{Execution, ExecutionStateError, RollbackResult, StepResult};
pub use status::ExecutionStatus;
