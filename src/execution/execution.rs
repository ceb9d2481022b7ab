// ABOUTME: One run of a pipeline definition and the records it accumulates.
// ABOUTME: Every mutation goes through a checked transition; terminal executions are frozen.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::{Phase, PipelineDefinition, StepError, StepErrorKind, StepOutput};
use crate::risk::RiskAssessment;
use crate::types::{ApplicationId, ExecutionId};

use super::status::ExecutionStatus;

/// Final outcome of a step's forward action (after any retries).
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: String,
    pub phase: Phase,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StepErrorKind>,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

impl StepResult {
    pub fn succeeded(step: &str, phase: Phase, output: &StepOutput, attempts: u32) -> Self {
        StepResult {
            step: step.to_string(),
            phase,
            success: true,
            summary: Some(output.summary.clone()),
            details: output.details.clone(),
            error: None,
            error_kind: None,
            attempts,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(step: &str, phase: Phase, error: &StepError, attempts: u32) -> Self {
        StepResult {
            step: step.to_string(),
            phase,
            success: false,
            summary: None,
            details: serde_json::Value::Null,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            attempts,
            recorded_at: Utc::now(),
        }
    }
}

/// Outcome of one compensating action.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResult {
    pub step: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl RollbackResult {
    pub fn from_outcome(step: &str, outcome: &Result<StepOutput, StepError>) -> Self {
        RollbackResult {
            step: step.to_string(),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionStateError {
    #[error("cannot move execution from {from} to {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("execution is {0} and can no longer change")]
    Terminal(ExecutionStatus),

    #[error("a result for step {0} is already recorded")]
    DuplicateResult(String),

    #[error("execution is rolling back and cannot be cancelled")]
    RollingBack,
}

#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    id: ExecutionId,
    pipeline: PipelineDefinition,
    status: ExecutionStatus,
    current_phase: Option<Phase>,
    current_step: Option<String>,
    auto_approve: bool,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    step_results: Vec<StepResult>,
    rollback_results: Vec<RollbackResult>,
    risk_assessment: Option<RiskAssessment>,
    rollback_executed: bool,
}

impl Execution {
    /// A pending execution owning its own snapshot of the pipeline.
    pub fn new(pipeline: PipelineDefinition, auto_approve: bool) -> Self {
        Execution {
            id: ExecutionId::generate(),
            pipeline,
            status: ExecutionStatus::Pending,
            current_phase: None,
            current_step: None,
            auto_approve,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            step_results: Vec::new(),
            rollback_results: Vec::new(),
            risk_assessment: None,
            rollback_executed: false,
        }
    }

    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    pub fn application(&self) -> &ApplicationId {
        self.pipeline.application()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current_phase
    }

    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Step results in the order they were recorded.
    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    pub fn step_result(&self, step: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step == step)
    }

    /// Compensation outcomes in the order they ran.
    pub fn rollback_results(&self) -> &[RollbackResult] {
        &self.rollback_results
    }

    pub fn risk_assessment(&self) -> Option<&RiskAssessment> {
        self.risk_assessment.as_ref()
    }

    pub fn rollback_executed(&self) -> bool {
        self.rollback_executed
    }

    /// Whether the run must pause for approval before deploying.
    pub fn needs_approval(&self) -> bool {
        self.pipeline.approval_required() && !self.auto_approve
    }

    pub fn start(&mut self) -> Result<(), ExecutionStateError> {
        self.transition(ExecutionStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn enter_phase(&mut self, phase: Phase) -> Result<(), ExecutionStateError> {
        self.ensure_running()?;
        self.current_phase = Some(phase);
        self.current_step = None;
        Ok(())
    }

    pub fn begin_step(&mut self, step: &str) -> Result<(), ExecutionStateError> {
        self.ensure_running()?;
        self.current_step = Some(step.to_string());
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ExecutionStateError> {
        self.transition(ExecutionStatus::Paused)
    }

    pub fn resume(&mut self) -> Result<(), ExecutionStateError> {
        self.transition(ExecutionStatus::InProgress)
    }

    /// Append a step result. Existing entries are never replaced.
    pub fn record_step(&mut self, mut result: StepResult) -> Result<(), ExecutionStateError> {
        self.ensure_mutable()?;
        if self.step_result(&result.step).is_some() {
            return Err(ExecutionStateError::DuplicateResult(result.step));
        }
        if let Some(last) = self.step_results.last() {
            result.recorded_at = result.recorded_at.max(last.recorded_at);
        }
        self.step_results.push(result);
        Ok(())
    }

    pub fn record_rollback(&mut self, result: RollbackResult) -> Result<(), ExecutionStateError> {
        self.ensure_mutable()?;
        if self.rollback_results.iter().any(|r| r.step == result.step) {
            return Err(ExecutionStateError::DuplicateResult(result.step));
        }
        self.rollback_results.push(result);
        Ok(())
    }

    /// Keep the first assessment; later ones are ignored. Returns whether it was stored.
    pub fn cache_risk_assessment(&mut self, assessment: RiskAssessment) -> bool {
        if self.is_terminal() || self.risk_assessment.is_some() {
            return false;
        }
        self.risk_assessment = Some(assessment);
        true
    }

    pub fn begin_rollback(&mut self) -> Result<(), ExecutionStateError> {
        self.ensure_running()?;
        self.current_phase = Some(Phase::Rollback);
        self.current_step = None;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), ExecutionStateError> {
        self.finish(ExecutionStatus::Completed, None)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ExecutionStateError> {
        self.finish(ExecutionStatus::Failed, Some(reason.into()))
    }

    pub fn finish_rollback(&mut self, reason: impl Into<String>) -> Result<(), ExecutionStateError> {
        self.finish(ExecutionStatus::RolledBack, Some(reason.into()))?;
        self.rollback_executed = true;
        Ok(())
    }

    /// Rejected once compensation has begun so the rollback record stays complete.
    pub fn cancel(&mut self) -> Result<(), ExecutionStateError> {
        if !self.status.is_terminal() && self.current_phase == Some(Phase::Rollback) {
            return Err(ExecutionStateError::RollingBack);
        }
        self.finish(
            ExecutionStatus::Cancelled,
            Some("cancelled by operator".to_string()),
        )
    }

    fn finish(
        &mut self,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) -> Result<(), ExecutionStateError> {
        self.transition(status)?;
        self.completed_at = Some(Utc::now());
        self.current_step = None;
        self.error_message = error_message;
        Ok(())
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), ExecutionStateError> {
        if self.status.is_terminal() {
            return Err(ExecutionStateError::Terminal(self.status));
        }
        if !self.status.can_transition_to(next) {
            return Err(ExecutionStateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), ExecutionStateError> {
        if self.status.is_terminal() {
            return Err(ExecutionStateError::Terminal(self.status));
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ExecutionStateError> {
        self.ensure_mutable()?;
        if self.status != ExecutionStatus::InProgress {
            return Err(ExecutionStateError::InvalidTransition {
                from: self.status,
                to: ExecutionStatus::InProgress,
            });
        }
        Ok(())
    }
}
