// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, scriptable step actions and orchestrator fixtures.

use async_trait::async_trait;
use parking_lot::Mutex;
use rollout::config::OrchestratorConfig;
use rollout::orchestrator::{Collaborators, Orchestrator};
use rollout::pipeline::{
    DeploymentStrategy, Phase, PipelineDefinition, PipelineTemplate, Step, StepAction,
    StepContext, StepError, StepOutput, TemplateRegistry,
};
use rollout::services::{
    ApprovalChannel, AutoApprovalChannel, SimulatedContainerService, StaticRiskService,
};
use rollout::types::ApplicationId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("rollout=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn app(name: &str) -> ApplicationId {
    ApplicationId::new(name).unwrap()
}

/// Ordered record of every action invocation, shared by the actions of one test.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// How a scripted action behaves when run.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Fail this many times, then succeed.
    FailTimes(u32),
    Sleep(Duration),
    Panic,
}

/// Action that journals `<label>` on every run and then behaves as scripted.
#[derive(Debug)]
pub struct Scripted {
    label: String,
    behavior: Behavior,
    journal: Journal,
    runs: AtomicU32,
}

#[allow(dead_code)]
impl Scripted {
    pub fn new(label: impl Into<String>, behavior: Behavior, journal: &Journal) -> Self {
        Scripted {
            label: label.into(),
            behavior,
            journal: journal.clone(),
            runs: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl StepAction for Scripted {
    async fn run(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
        self.journal.push(self.label.clone());
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(StepOutput::new(format!("{} ok", self.label))),
            Behavior::Fail => Err(StepError::failed(format!("{} failed", self.label))),
            Behavior::FailTimes(n) if run < n => {
                Err(StepError::failed(format!("{} attempt {} failed", self.label, run + 1)))
            }
            Behavior::FailTimes(_) => Ok(StepOutput::new(format!("{} ok", self.label))),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(StepOutput::new(format!("{} slept", self.label)))
            }
            Behavior::Panic => panic!("{} exploded", self.label),
        }
    }

    fn describe(&self) -> String {
        format!("scripted:{}", self.label)
    }
}

/// A step whose forward action journals `name` and whose rollback journals `undo:name`.
#[allow(dead_code)]
pub fn step(name: &str, phase: Phase, behavior: Behavior, journal: &Journal) -> Step {
    Step::new(name, phase, Scripted::new(name, behavior, journal))
}

#[allow(dead_code)]
pub fn compensable(name: &str, phase: Phase, behavior: Behavior, journal: &Journal) -> Step {
    step(name, phase, behavior, journal).with_rollback(Scripted::new(
        format!("undo:{name}"),
        Behavior::Succeed,
        journal,
    ))
}

#[allow(dead_code)]
pub fn template(steps: Vec<Step>) -> PipelineTemplate {
    PipelineTemplate::new(DeploymentStrategy::Rolling, steps).unwrap()
}

#[allow(dead_code)]
pub fn definition(application: &str, steps: Vec<Step>) -> PipelineDefinition {
    PipelineDefinition::from_template(&template(steps), app(application), "1.0.0").unwrap()
}

/// Limits suited to tests: no backoff between attempts.
#[allow(dead_code)]
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry_backoff: Duration::ZERO,
        ..OrchestratorConfig::default()
    }
}

/// An orchestrator over the simulated scheduler, returned alongside it.
#[allow(dead_code)]
pub fn orchestrator(
    config: OrchestratorConfig,
    approval: Arc<dyn ApprovalChannel>,
) -> (Orchestrator, Arc<SimulatedContainerService>) {
    let container = Arc::new(SimulatedContainerService::new());
    let collaborators = Collaborators::new(
        container.clone(),
        Arc::new(StaticRiskService::new(Vec::new())),
        approval,
    );
    (
        Orchestrator::new(config, TemplateRegistry::with_builtin(), collaborators),
        container,
    )
}

#[allow(dead_code)]
pub fn auto_orchestrator() -> (Orchestrator, Arc<SimulatedContainerService>) {
    orchestrator(fast_config(), Arc::new(AutoApprovalChannel))
}

/// Poll until `check` holds, failing the test after two seconds.
#[allow(dead_code)]
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
