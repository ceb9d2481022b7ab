// ABOUTME: Registry of named pipeline templates and per-request overrides.
// ABOUTME: Instantiation clones the template; overrides never touch the registered copy.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::types::ApplicationId;

use super::builtin;
use super::definition::{PipelineDefinition, PipelineTemplate};
use super::error::PipelineError;
use super::strategy::DeploymentStrategy;

/// Fields a caller may change when instantiating a template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineOverrides {
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub strategy: Option<DeploymentStrategy>,

    #[serde(default)]
    pub auto_rollback: Option<bool>,

    #[serde(default)]
    pub approval_required: Option<bool>,

    #[serde(default)]
    pub notification_targets: Option<Vec<String>>,

    /// Per-step timeout replacements, keyed by step name.
    #[serde(default, with = "humantime_serde_map")]
    pub step_timeouts: HashMap<String, Duration>,

    /// Per-step retry budget replacements, keyed by step name.
    #[serde(default)]
    pub step_retries: HashMap<String, u32>,
}

impl PipelineOverrides {
    fn apply(&self, def: &mut PipelineDefinition) -> Result<(), PipelineError> {
        if let Some(ref environment) = self.environment {
            def.environment = environment.clone();
        }
        if let Some(strategy) = self.strategy {
            def.strategy = strategy;
        }
        if let Some(auto_rollback) = self.auto_rollback {
            def.auto_rollback = auto_rollback;
        }
        if let Some(approval_required) = self.approval_required {
            def.approval_required = approval_required;
        }
        if let Some(ref targets) = self.notification_targets {
            def.notification_targets = targets.clone();
        }

        for name in self.step_timeouts.keys().chain(self.step_retries.keys()) {
            if def.step(name).is_none() {
                return Err(PipelineError::UnknownStep(name.clone()));
            }
        }

        for step in def.steps.iter_mut() {
            if let Some(timeout) = self.step_timeouts.get(&step.name) {
                step.timeout = *timeout;
            }
            if let Some(retries) = self.step_retries.get(&step.name) {
                step.retries = *retries;
            }
        }

        Ok(())
    }
}

/// Named templates available to `create_pipeline`.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PipelineTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `standard`, `blue_green` and `canary` templates.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for (name, template) in builtin::templates() {
            registry.register(name, template);
        }
        registry
    }

    /// Register a template, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        template: PipelineTemplate,
    ) -> Option<PipelineTemplate> {
        self.templates.insert(name.into(), template)
    }

    pub fn get(&self, name: &str) -> Option<&PipelineTemplate> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PipelineTemplate)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Clone a template into a definition for one application version.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::TemplateNotFound` for an unknown name, and
    /// `PipelineError::UnknownStep` when an override names a missing step.
    pub fn instantiate(
        &self,
        template_name: &str,
        application: ApplicationId,
        version: impl Into<String>,
        overrides: &PipelineOverrides,
    ) -> Result<PipelineDefinition, PipelineError> {
        let template = self
            .get(template_name)
            .ok_or_else(|| PipelineError::TemplateNotFound(template_name.to_string()))?;

        let mut def = PipelineDefinition::from_template(template, application, version)?;
        overrides.apply(&mut def)?;
        Ok(def)
    }
}

/// `humantime_serde` for the values of a string-keyed map.
mod humantime_serde_map {
    use serde::{Deserialize, Deserializer};
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "humantime_serde")] Duration);

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: HashMap<String, Wrapped> = HashMap::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, Wrapped(d))| (k, d)).collect())
    }
}
