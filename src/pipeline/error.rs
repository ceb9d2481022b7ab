// ABOUTME: Errors raised while building templates and pipeline definitions.
// ABOUTME: These are synchronous, caller-visible failures; nothing here happens mid-execution.

use super::phase::Phase;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// No template registered under this name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A pipeline needs at least one step.
    #[error("pipeline has no steps")]
    NoSteps,

    /// Step names identify results and must be unique.
    #[error("duplicate step name: {0}")]
    DuplicateStep(String),

    /// Steps may only be bound to forward phases.
    #[error("step {step} cannot be bound to the {phase} phase")]
    InvalidPhase { step: String, phase: Phase },

    /// An override referenced a step the template does not have.
    #[error("override references unknown step: {0}")]
    UnknownStep(String),

    /// A version string is required to instantiate a pipeline.
    #[error("pipeline version cannot be empty")]
    EmptyVersion,
}
