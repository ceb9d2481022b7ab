// ABOUTME: Step values: a named forward action bound to one phase, with optional compensation.
// ABOUTME: Steps are immutable once built and shared cheaply between templates and executions.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::action::StepAction;
use super::phase::Phase;

/// Default bound on a single step attempt.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub phase: Phase,
    pub description: String,
    pub action: Arc<dyn StepAction>,
    pub rollback: Option<Arc<dyn StepAction>>,
    pub timeout: Duration,
    /// Extra attempts allowed after the first failure.
    pub retries: u32,
    pub required: bool,
}

impl Step {
    /// A required step with no retries and the default timeout.
    pub fn new(name: impl Into<String>, phase: Phase, action: impl StepAction + 'static) -> Self {
        Self::from_shared(name, phase, Arc::new(action))
    }

    pub fn from_shared(name: impl Into<String>, phase: Phase, action: Arc<dyn StepAction>) -> Self {
        Step {
            name: name.into(),
            phase,
            description: String::new(),
            action,
            rollback: None,
            timeout: DEFAULT_STEP_TIMEOUT,
            retries: 0,
            required: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rollback(mut self, action: impl StepAction + 'static) -> Self {
        self.rollback = Some(Arc::new(action));
        self
    }

    pub fn with_shared_rollback(mut self, action: Arc<dyn StepAction>) -> Self {
        self.rollback = Some(action);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Failures of an optional step are recorded but do not halt the pipeline.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback.is_some()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("action", &self.action.describe())
            .field("rollback", &self.rollback.as_ref().map(|a| a.describe()))
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("required", &self.required)
            .finish()
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct StepView<'a> {
            name: &'a str,
            phase: Phase,
            description: &'a str,
            action: String,
            rollback: Option<String>,
            #[serde(with = "humantime_serde")]
            timeout: Duration,
            retries: u32,
            required: bool,
        }

        StepView {
            name: &self.name,
            phase: self.phase,
            description: &self.description,
            action: self.action.describe(),
            rollback: self.rollback.as_ref().map(|a| a.describe()),
            timeout: self.timeout,
            retries: self.retries,
            required: self.required,
        }
        .serialize(serializer)
    }
}
