// ABOUTME: Compile-fail test verifying ExecutionId and PipelineId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use rollout::types::{ExecutionId, PipelineId};

fn takes_execution_id(_id: ExecutionId) {}

fn main() {
    let pipeline_id = PipelineId::new("pipeline-1");
    takes_execution_id(pipeline_id); // ERROR: expected ExecutionId, found PipelineId
}
