// ABOUTME: Declarative pipeline templates read from the configuration file.
// ABOUTME: Steps reference built-in actions by kind and convert into validated templates.

use serde::Deserialize;
use std::time::Duration;

use crate::pipeline::{
    BuiltinAction, DEFAULT_STEP_TIMEOUT, DeploymentStrategy, Phase, PipelineError,
    PipelineTemplate, Step,
};

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub strategy: DeploymentStrategy,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_true")]
    pub auto_rollback: bool,

    #[serde(default)]
    pub approval_required: bool,

    #[serde(default)]
    pub notification_targets: Vec<String>,

    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,

    pub phase: Phase,

    #[serde(default)]
    pub description: String,

    pub action: BuiltinAction,

    #[serde(default)]
    pub rollback: Option<BuiltinAction>,

    #[serde(default = "default_step_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_true() -> bool {
    true
}

fn default_step_timeout() -> Duration {
    DEFAULT_STEP_TIMEOUT
}

impl StepConfig {
    fn into_step(self) -> Step {
        let mut step = Step::new(self.name, self.phase, self.action)
            .description(self.description)
            .timeout(self.timeout)
            .retries(self.retries);
        if let Some(rollback) = self.rollback {
            step = step.with_rollback(rollback);
        }
        if !self.required {
            step = step.optional();
        }
        step
    }
}

impl TemplateConfig {
    /// Validate and convert into a registrable template.
    pub fn into_template(self) -> Result<PipelineTemplate, PipelineError> {
        let steps = self.steps.into_iter().map(StepConfig::into_step).collect();
        Ok(PipelineTemplate::new(self.strategy, steps)?
            .with_description(self.description)
            .with_environment(self.environment)
            .with_auto_rollback(self.auto_rollback)
            .with_approval_required(self.approval_required)
            .with_notification_targets(self.notification_targets))
    }
}
