// ABOUTME: Errors the orchestrator returns synchronously to callers.
// ABOUTME: Step-level failures never appear here; they surface through execution status.

use crate::pipeline::PipelineError;
use crate::types::ExecutionId;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Admission refused: the active set is at its ceiling.
    #[error("maximum concurrent executions reached ({limit})")]
    CapacityExceeded { limit: usize },

    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("execution {0} is already running")]
    DuplicateExecution(ExecutionId),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The task driving an execution ended abnormally.
    #[error("execution task failed: {0}")]
    TaskFailed(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorErrorKind {
    Admission,
    NotFound,
    InvalidPipeline,
    Internal,
}

impl OrchestratorError {
    pub fn kind(&self) -> OrchestratorErrorKind {
        match self {
            OrchestratorError::CapacityExceeded { .. }
            | OrchestratorError::DuplicateExecution(_) => OrchestratorErrorKind::Admission,
            OrchestratorError::ExecutionNotFound(_)
            | OrchestratorError::Pipeline(PipelineError::TemplateNotFound(_)) => {
                OrchestratorErrorKind::NotFound
            }
            OrchestratorError::Pipeline(_) => OrchestratorErrorKind::InvalidPipeline,
            OrchestratorError::TaskFailed(_) => OrchestratorErrorKind::Internal,
        }
    }
}
