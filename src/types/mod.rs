// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Phantom-typed ids keep execution and pipeline ids apart at compile time.

mod application_id;
mod id;

pub use application_id::{ApplicationId, ApplicationIdError};
pub use id::{ExecutionId, Id, PipelineId};
