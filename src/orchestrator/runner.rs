// ABOUTME: Drives one execution through its phases, the approval gate and rollback.
// ABOUTME: The execution lock is only held between awaits, never across one.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::execution::{Execution, ExecutionStatus, StepResult};
use crate::pipeline::{Phase, Step, StepContext, StepErrorKind};
use crate::services::ApprovalDecision;

use super::attempt;
use super::orchestrator::Shared;
use super::rollback;

/// What the runner does after a step has been recorded.
enum StepFlow {
    Continue,
    Halt,
    RollBack(String),
}

/// Outcome of the pre-deployment approval gate.
enum Gate {
    Approved,
    Rejected(String),
    Cancelled,
}

pub(crate) struct Runner {
    shared: Arc<Shared>,
    execution: Arc<Mutex<Execution>>,
    cancelled: watch::Receiver<bool>,
    ctx: StepContext,
}

impl Runner {
    pub(crate) fn new(
        shared: Arc<Shared>,
        execution: Arc<Mutex<Execution>>,
        cancelled: watch::Receiver<bool>,
    ) -> Self {
        let ctx = {
            let exec = execution.lock();
            let pipeline = exec.pipeline();
            StepContext {
                execution_id: exec.id().clone(),
                application: pipeline.application().clone(),
                version: pipeline.version().to_string(),
                environment: pipeline.environment().to_string(),
                strategy: pipeline.strategy(),
                step: String::new(),
                timeout: Duration::ZERO,
                services: shared.collaborators.services(),
            }
        };

        Runner {
            shared,
            execution,
            cancelled,
            ctx,
        }
    }

    /// Run to a terminal status, archive the execution and notify.
    pub(crate) async fn run(mut self) -> Execution {
        self.drive().await;

        if !self.read(Execution::is_terminal) {
            self.roll_back("pipeline execution error: execution halted before reaching a terminal state".to_string())
                .await;
        }

        let id = self.ctx.execution_id.clone();
        let snapshot = match self.shared.archive(&id) {
            Some(snapshot) => snapshot,
            None => self.read(|e| e.clone()),
        };

        match snapshot.status() {
            ExecutionStatus::Completed => tracing::info!(
                execution_id = %id,
                application = %snapshot.application(),
                "execution completed"
            ),
            status => tracing::warn!(
                execution_id = %id,
                application = %snapshot.application(),
                status = %status,
                "execution finished: {}",
                snapshot.error_message().unwrap_or("no reason recorded")
            ),
        }

        let targets = snapshot.pipeline().notification_targets();
        if !targets.is_empty()
            && let Err(e) = self
                .shared
                .collaborators
                .notifier
                .notify(targets, &snapshot)
                .await
        {
            tracing::warn!(execution_id = %id, "notification failed: {}", e);
        }

        snapshot
    }

    fn read<R>(&self, f: impl FnOnce(&Execution) -> R) -> R {
        f(&self.execution.lock())
    }

    fn update<R>(&self, f: impl FnOnce(&mut Execution) -> R) -> R {
        f(&mut self.execution.lock())
    }

    async fn drive(&mut self) {
        if let Err(e) = self.update(Execution::start) {
            tracing::debug!(execution_id = %self.ctx.execution_id, "execution not started: {}", e);
            return;
        }
        tracing::info!(
            execution_id = %self.ctx.execution_id,
            application = %self.ctx.application,
            version = %self.ctx.version,
            strategy = %self.ctx.strategy,
            "execution started"
        );

        let pipeline = self.read(|e| e.pipeline().clone());

        for phase in pipeline.active_phases() {
            if self.update(|e| e.enter_phase(phase)).is_err() {
                return;
            }
            tracing::debug!(execution_id = %self.ctx.execution_id, phase = %phase, "entering phase");

            if phase == Phase::Deployment && self.read(Execution::needs_approval) {
                match self.await_approval().await {
                    Gate::Approved => {}
                    Gate::Rejected(reason) => {
                        self.roll_back(format!("deployment approval rejected: {reason}"))
                            .await;
                        return;
                    }
                    Gate::Cancelled => return,
                }
            }

            for step in pipeline.steps_in(phase) {
                match self.run_step(step).await {
                    StepFlow::Continue => {}
                    StepFlow::Halt => return,
                    StepFlow::RollBack(reason) => {
                        self.roll_back(reason).await;
                        return;
                    }
                }
            }
        }

        if let Err(e) = self.update(Execution::complete) {
            tracing::debug!(execution_id = %self.ctx.execution_id, "execution not completed: {}", e);
        }
    }

    async fn await_approval(&mut self) -> Gate {
        if self.update(Execution::pause).is_err() {
            return Gate::Cancelled;
        }
        tracing::info!(
            execution_id = %self.ctx.execution_id,
            application = %self.ctx.application,
            "paused awaiting deployment approval"
        );

        let approval = self.shared.collaborators.approval.clone();
        let mut cancelled = self.cancelled.clone();
        let gate = tokio::select! {
            decision = approval.await_approval(&self.ctx.execution_id) => match decision {
                Ok(ApprovalDecision::Approved) => Gate::Approved,
                Ok(ApprovalDecision::Rejected { reason }) => Gate::Rejected(reason),
                Err(e) => Gate::Rejected(e.to_string()),
            },
            _ = cancelled.wait_for(|c| *c) => Gate::Cancelled,
        };

        if matches!(gate, Gate::Cancelled) || self.update(Execution::resume).is_err() {
            return Gate::Cancelled;
        }
        gate
    }

    async fn run_step(&mut self, step: &Step) -> StepFlow {
        if self.update(|e| e.begin_step(&step.name)).is_err() {
            return StepFlow::Halt;
        }
        self.ctx.step = step.name.clone();
        self.ctx.timeout = step.timeout;

        let report = attempt::run_with_retries(
            step,
            &self.ctx,
            self.shared.config.retry_backoff,
            &self.cancelled,
        )
        .await;

        let recorded = self.update(|e| {
            let result = match &report.outcome {
                Ok(output) => StepResult::succeeded(&step.name, step.phase, output, report.attempts),
                Err(err) => StepResult::failed(&step.name, step.phase, err, report.attempts),
            };
            e.record_step(result)?;
            if let Ok(output) = &report.outcome
                && let Some(assessment) = &output.risk_assessment
            {
                e.cache_risk_assessment(assessment.clone());
            }
            Ok::<_, crate::execution::ExecutionStateError>(())
        });
        if let Err(e) = recorded {
            tracing::debug!(
                execution_id = %self.ctx.execution_id,
                step = %step.name,
                "step result discarded: {}",
                e
            );
            return StepFlow::Halt;
        }

        match report.outcome {
            Ok(output) => {
                tracing::info!(
                    execution_id = %self.ctx.execution_id,
                    step = %step.name,
                    attempts = report.attempts,
                    "{}",
                    output.summary
                );
                StepFlow::Continue
            }
            Err(err) if err.kind() == StepErrorKind::Internal => {
                tracing::error!(
                    execution_id = %self.ctx.execution_id,
                    step = %step.name,
                    "internal fault: {}",
                    err
                );
                StepFlow::RollBack(format!("pipeline execution error: step {}: {}", step.name, err))
            }
            Err(err) if step.required => {
                tracing::error!(
                    execution_id = %self.ctx.execution_id,
                    step = %step.name,
                    attempts = report.attempts,
                    "required step failed: {}",
                    err
                );
                StepFlow::RollBack(format!("required step failed: {}", step.name))
            }
            Err(err) => {
                tracing::warn!(
                    execution_id = %self.ctx.execution_id,
                    step = %step.name,
                    "optional step failed, continuing: {}",
                    err
                );
                StepFlow::Continue
            }
        }
    }

    /// Compensate completed steps, or fail outright when auto-rollback is off.
    async fn roll_back(&mut self, reason: String) {
        if self.read(Execution::status) == ExecutionStatus::Paused
            && let Err(e) = self.update(Execution::resume)
        {
            tracing::debug!(execution_id = %self.ctx.execution_id, "execution not resumed: {}", e);
        }

        if !self.read(|e| e.pipeline().auto_rollback()) {
            if self.update(|e| e.fail(reason.clone())).is_ok() {
                tracing::error!(
                    execution_id = %self.ctx.execution_id,
                    "execution failed without rollback: {}",
                    reason
                );
            }
            return;
        }

        if self.update(Execution::begin_rollback).is_err() {
            return;
        }
        tracing::warn!(
            execution_id = %self.ctx.execution_id,
            application = %self.ctx.application,
            "rolling back: {}",
            reason
        );

        let plan = self.read(rollback::compensation_plan);
        for step in &plan {
            self.ctx.step = step.name.clone();
            self.ctx.timeout = step.timeout;
            let result = rollback::compensate(step, &self.ctx).await;
            if let Err(e) = self.update(|exec| exec.record_rollback(result)) {
                tracing::debug!(execution_id = %self.ctx.execution_id, "rollback result discarded: {}", e);
            }
        }

        if let Err(e) = self.update(|exec| exec.finish_rollback(reason)) {
            tracing::debug!(execution_id = %self.ctx.execution_id, "rollback not finalized: {}", e);
        }
    }
}
