// ABOUTME: The pluggable unit of work behind every step, plus its context and error types.
// ABOUTME: Step errors use SNAFU with a kind() accessor for programmatic handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::risk::RiskAssessment;
use crate::services::{ContainerDeploymentService, RiskScoringService, ServiceError};
use crate::types::{ApplicationId, ExecutionId};

use super::DeploymentStrategy;

/// Work performed by a step, either forward or as compensation.
///
/// Forward actions may be restarted from scratch when a step is retried, so
/// they must be idempotent. Rollback actions must tolerate a forward action
/// that only partially completed.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutput, StepError>;

    /// Short label shown in listings and execution snapshots.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

/// Collaborators reachable from step actions.
#[derive(Clone)]
pub struct Services {
    pub container: Arc<dyn ContainerDeploymentService>,
    pub risk: Arc<dyn RiskScoringService>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Everything an action knows about the execution it runs in.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub execution_id: ExecutionId,
    pub application: ApplicationId,
    pub version: String,
    pub environment: String,
    pub strategy: DeploymentStrategy,
    pub step: String,
    /// Bound on one attempt of the current step.
    pub timeout: Duration,
    pub services: Services,
}

impl StepContext {
    /// Name of the container service this execution deploys to.
    pub fn service_name(&self) -> String {
        format!("{}-{}", self.application, self.environment)
    }
}

/// What a successful action reports back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepOutput {
    pub summary: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
}

impl StepOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: serde_json::Value::Null,
            risk_assessment: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_risk_assessment(mut self, assessment: RiskAssessment) -> Self {
        self.risk_assessment = Some(assessment);
        self
    }
}

/// Why a step attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum StepError {
    #[snafu(display("{message}"))]
    Failed { message: String },

    #[snafu(display("timed out after {timeout:?}"))]
    TimedOut { timeout: Duration },

    #[snafu(display("action panicked: {message}"))]
    Panicked { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The action reported a failure.
    Failure,
    /// The action did not finish within the step timeout.
    Timeout,
    /// The action faulted unexpectedly; never retried.
    Internal,
}

impl StepError {
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StepErrorKind {
        match self {
            StepError::Failed { .. } => StepErrorKind::Failure,
            StepError::TimedOut { .. } => StepErrorKind::Timeout,
            StepError::Panicked { .. } => StepErrorKind::Internal,
        }
    }

    /// Whether another attempt may be made under the retry budget.
    pub fn is_retryable(&self) -> bool {
        self.kind() != StepErrorKind::Internal
    }
}

impl From<ServiceError> for StepError {
    fn from(err: ServiceError) -> Self {
        StepError::failed(err.to_string())
    }
}
