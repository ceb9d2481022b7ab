// ABOUTME: Pipeline templates and the concrete definitions instantiated from them.
// ABOUTME: Both validate their steps on construction and are never mutated afterwards.

use nonempty::NonEmpty;
use serde::Serialize;
use std::collections::HashSet;

use crate::types::{ApplicationId, PipelineId};

use super::error::PipelineError;
use super::phase::Phase;
use super::step::Step;
use super::strategy::DeploymentStrategy;

const DEFAULT_ENVIRONMENT: &str = "production";

/// Reusable pipeline shape: steps plus policies, without an application bound.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTemplate {
    pub(crate) description: String,
    pub(crate) strategy: DeploymentStrategy,
    pub(crate) environment: String,
    pub(crate) auto_rollback: bool,
    pub(crate) approval_required: bool,
    pub(crate) notification_targets: Vec<String>,
    pub(crate) steps: NonEmpty<Step>,
}

impl PipelineTemplate {
    /// Build a template with auto-rollback on and approval off.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if there are no steps, a step name repeats, or a
    /// step is bound to the rollback phase.
    pub fn new(strategy: DeploymentStrategy, steps: Vec<Step>) -> Result<Self, PipelineError> {
        let steps = validate_steps(steps)?;
        Ok(PipelineTemplate {
            description: String::new(),
            strategy,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            auto_rollback: true,
            approval_required: false,
            notification_targets: Vec::new(),
            steps,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_auto_rollback(mut self, enabled: bool) -> Self {
        self.auto_rollback = enabled;
        self
    }

    pub fn with_approval_required(mut self, required: bool) -> Self {
        self.approval_required = required;
        self
    }

    pub fn with_notification_targets(mut self, targets: Vec<String>) -> Self {
        self.notification_targets = targets;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn strategy(&self) -> DeploymentStrategy {
        self.strategy
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn auto_rollback(&self) -> bool {
        self.auto_rollback
    }

    pub fn approval_required(&self) -> bool {
        self.approval_required
    }

    pub fn notification_targets(&self) -> &[String] {
        &self.notification_targets
    }

    pub fn steps(&self) -> &NonEmpty<Step> {
        &self.steps
    }
}

/// A pipeline bound to one application version, ready to execute.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineDefinition {
    pub(crate) id: PipelineId,
    pub(crate) application: ApplicationId,
    pub(crate) version: String,
    pub(crate) strategy: DeploymentStrategy,
    pub(crate) environment: String,
    pub(crate) auto_rollback: bool,
    pub(crate) approval_required: bool,
    pub(crate) notification_targets: Vec<String>,
    pub(crate) steps: NonEmpty<Step>,
}

impl PipelineDefinition {
    /// Bind a template to an application version with the template's policies.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::EmptyVersion` for a blank version.
    pub fn from_template(
        template: &PipelineTemplate,
        application: ApplicationId,
        version: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(PipelineError::EmptyVersion);
        }

        Ok(PipelineDefinition {
            id: PipelineId::generate(),
            application,
            version,
            strategy: template.strategy,
            environment: template.environment.clone(),
            auto_rollback: template.auto_rollback,
            approval_required: template.approval_required,
            notification_targets: template.notification_targets.clone(),
            steps: template.steps.clone(),
        })
    }

    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    pub fn application(&self) -> &ApplicationId {
        &self.application
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn strategy(&self) -> DeploymentStrategy {
        self.strategy
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn auto_rollback(&self) -> bool {
        self.auto_rollback
    }

    pub fn approval_required(&self) -> bool {
        self.approval_required
    }

    pub fn notification_targets(&self) -> &[String] {
        &self.notification_targets
    }

    pub fn steps(&self) -> &NonEmpty<Step> {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Steps of one phase, in declaration order.
    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.phase == phase)
    }

    /// Forward phases that have at least one step, in execution order.
    pub fn active_phases(&self) -> Vec<Phase> {
        Phase::FORWARD
            .into_iter()
            .filter(|phase| self.steps_in(*phase).next().is_some())
            .collect()
    }
}

pub(crate) fn validate_steps(steps: Vec<Step>) -> Result<NonEmpty<Step>, PipelineError> {
    let mut seen = HashSet::new();
    for step in &steps {
        if !step.phase.is_forward() {
            return Err(PipelineError::InvalidPhase {
                step: step.name.clone(),
                phase: step.phase,
            });
        }
        if !seen.insert(step.name.as_str()) {
            return Err(PipelineError::DuplicateStep(step.name.clone()));
        }
    }
    NonEmpty::from_vec(steps).ok_or(PipelineError::NoSteps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BuiltinAction;

    fn step(name: &str, phase: Phase) -> Step {
        Step::new(name, phase, BuiltinAction::Finalize)
    }

    #[test]
    fn rejects_empty_step_list() {
        let err = PipelineTemplate::new(DeploymentStrategy::Rolling, vec![]).unwrap_err();
        assert_eq!(err, PipelineError::NoSteps);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = PipelineTemplate::new(
            DeploymentStrategy::Rolling,
            vec![
                step("deploy", Phase::Deployment),
                step("deploy", Phase::Validation),
            ],
        )
        .unwrap_err();
        assert_eq!(err, PipelineError::DuplicateStep("deploy".into()));
    }

    #[test]
    fn rejects_rollback_phase_steps() {
        let err = PipelineTemplate::new(
            DeploymentStrategy::Rolling,
            vec![step("undo", Phase::Rollback)],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPhase { .. }));
    }

    #[test]
    fn active_phases_skip_empty_phases_in_order() {
        let template = PipelineTemplate::new(
            DeploymentStrategy::Rolling,
            vec![
                step("verify", Phase::Validation),
                step("prepare", Phase::Preparation),
            ],
        )
        .unwrap();
        let app = ApplicationId::new("api").unwrap();
        let def = PipelineDefinition::from_template(&template, app, "1.0.0").unwrap();
        assert_eq!(
            def.active_phases(),
            vec![Phase::Preparation, Phase::Validation]
        );
    }

    #[test]
    fn blank_version_is_rejected() {
        let template =
            PipelineTemplate::new(DeploymentStrategy::Rolling, vec![step("a", Phase::Completion)])
                .unwrap();
        let app = ApplicationId::new("api").unwrap();
        assert_eq!(
            PipelineDefinition::from_template(&template, app, "  ").unwrap_err(),
            PipelineError::EmptyVersion
        );
    }
}
