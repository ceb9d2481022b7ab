// ABOUTME: Pipeline building blocks: phases, steps, actions, definitions and templates.
// ABOUTME: Everything here is immutable data; executing it is the orchestrator's job.

mod action;
mod builtin;
mod definition;
mod error;
mod phase;
mod step;
mod strategy;
mod template;

pub use action::{Services, StepAction, StepContext, StepError, StepErrorKind, StepOutput};
pub use builtin::BuiltinAction;
pub use definition::{PipelineDefinition, PipelineTemplate};
pub use error::PipelineError;
pub use phase::Phase;
pub use step::{DEFAULT_STEP_TIMEOUT, Step};
pub use strategy::DeploymentStrategy;
pub use template::{PipelineOverrides, TemplateRegistry};
