// ABOUTME: Compensation planning and best-effort execution of rollback actions.
// ABOUTME: Rollback actions run in strict reverse order of forward success.

use crate::execution::{Execution, RollbackResult};
use crate::pipeline::{Step, StepContext};

use super::attempt::run_once;

/// Steps whose rollback actions must run, in the order to run them.
///
/// This function:
/// 1. Walks the recorded results in forward-success order
/// 2. Keeps successful steps that declare a rollback action
/// 3. Reverses the list so the most recent success is compensated first
///
/// Failed steps are never compensated: their rollback action must already
/// tolerate partial completion, but nothing succeeded there to undo.
pub(crate) fn compensation_plan(execution: &Execution) -> Vec<Step> {
    let pipeline = execution.pipeline();
    let mut plan: Vec<Step> = execution
        .step_results()
        .iter()
        .filter(|result| result.success)
        .filter_map(|result| pipeline.step(&result.step))
        .filter(|step| step.has_rollback())
        .cloned()
        .collect();
    plan.reverse();
    plan
}

/// Run one step's rollback action once, under the step's timeout.
///
/// Failures are logged and returned as a failed result; they never abort
/// the remaining compensations.
pub(crate) async fn compensate(step: &Step, ctx: &StepContext) -> RollbackResult {
    let Some(action) = step.rollback.as_ref() else {
        return RollbackResult::from_outcome(&step.name, &Ok(Default::default()));
    };

    let outcome = run_once(action.as_ref(), ctx, step.timeout).await;
    match &outcome {
        Ok(output) => tracing::info!(
            execution_id = %ctx.execution_id,
            step = %step.name,
            "rolled back: {}",
            output.summary
        ),
        Err(e) => tracing::warn!(
            execution_id = %ctx.execution_id,
            step = %step.name,
            "rollback action failed: {}",
            e
        ),
    }
    RollbackResult::from_outcome(&step.name, &outcome)
}
