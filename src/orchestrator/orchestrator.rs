// ABOUTME: Admission, query and cancellation API over concurrently running executions.
// ABOUTME: Owns the shared active set and per-application history behind one mutex.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::OrchestratorConfig;
use crate::execution::Execution;
use crate::pipeline::{
    PipelineDefinition, PipelineOverrides, PipelineTemplate, Services, TemplateRegistry,
};
use crate::services::{
    ApprovalChannel, ContainerDeploymentService, LogNotifier, NotificationSink, RiskScoringService,
};
use crate::types::{ApplicationId, ExecutionId};

use super::error::OrchestratorError;
use super::runner::Runner;

/// External services an orchestrator drives executions against.
#[derive(Clone)]
pub struct Collaborators {
    pub container: Arc<dyn ContainerDeploymentService>,
    pub risk: Arc<dyn RiskScoringService>,
    pub approval: Arc<dyn ApprovalChannel>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Collaborators that report finished executions through tracing.
    pub fn new(
        container: Arc<dyn ContainerDeploymentService>,
        risk: Arc<dyn RiskScoringService>,
        approval: Arc<dyn ApprovalChannel>,
    ) -> Self {
        Collaborators {
            container,
            risk,
            approval,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub(crate) fn services(&self) -> Services {
        Services {
            container: self.container.clone(),
            risk: self.risk.clone(),
        }
    }
}

/// Handle to a submitted execution.
#[derive(Debug)]
pub struct ExecutionHandle {
    id: ExecutionId,
    task: JoinHandle<Execution>,
}

impl ExecutionHandle {
    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    /// Wait for the execution to reach a terminal status.
    pub async fn wait(self) -> Result<Execution, OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::TaskFailed(e.to_string()))
    }
}

/// An execution that has been admitted and not yet archived.
pub(crate) struct ActiveExecution {
    pub(crate) execution: Arc<Mutex<Execution>>,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct Registry {
    active: HashMap<ExecutionId, ActiveExecution>,
    history: HashMap<ApplicationId, VecDeque<Execution>>,
}

pub(crate) struct Shared {
    pub(crate) config: OrchestratorConfig,
    pub(crate) collaborators: Collaborators,
    templates: RwLock<TemplateRegistry>,
    registry: Mutex<Registry>,
}

impl Shared {
    /// Move a finished execution from the active set into its application's history.
    pub(crate) fn archive(&self, id: &ExecutionId) -> Option<Execution> {
        let mut registry = self.registry.lock();
        let record = registry.active.remove(id)?;
        let snapshot = record.execution.lock().clone();

        let history = registry
            .history
            .entry(snapshot.application().clone())
            .or_default();
        history.push_back(snapshot.clone());
        while history.len() > self.config.history_limit {
            history.pop_front();
        }

        Some(snapshot)
    }
}

/// Creates pipelines from templates and runs them as independent tasks.
///
/// Cloning an `Orchestrator` yields another handle to the same state.
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        templates: TemplateRegistry,
        collaborators: Collaborators,
    ) -> Self {
        Orchestrator {
            shared: Arc::new(Shared {
                config,
                collaborators,
                templates: RwLock::new(templates),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Register (or replace) a template by name.
    pub fn register_template(&self, name: impl Into<String>, template: PipelineTemplate) {
        self.shared.templates.write().register(name, template);
    }

    pub fn template_names(&self) -> Vec<String> {
        self.shared
            .templates
            .read()
            .names()
            .map(str::to_string)
            .collect()
    }

    /// Instantiate a template for one application version.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or the overrides do not fit it.
    pub fn create_pipeline(
        &self,
        application: ApplicationId,
        version: impl Into<String>,
        template: &str,
        overrides: &PipelineOverrides,
    ) -> Result<PipelineDefinition, OrchestratorError> {
        let definition = self
            .shared
            .templates
            .read()
            .instantiate(template, application, version, overrides)?;
        Ok(definition)
    }

    /// Admit a pipeline for execution and start it in the background.
    ///
    /// Returns as soon as the execution is registered; it does not wait for
    /// any step to run. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::CapacityExceeded` if the active set is full.
    pub fn execute(
        &self,
        pipeline: PipelineDefinition,
        auto_approve: bool,
    ) -> Result<ExecutionHandle, OrchestratorError> {
        let execution = Execution::new(pipeline, auto_approve);
        let id = execution.id().clone();
        let application = execution.application().clone();
        let cell = Arc::new(Mutex::new(execution));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        {
            let mut registry = self.shared.registry.lock();
            let limit = self.shared.config.max_concurrent_executions;
            if registry.active.len() >= limit {
                tracing::warn!(
                    application = %application,
                    limit,
                    "rejecting execution: concurrency limit reached"
                );
                return Err(OrchestratorError::CapacityExceeded { limit });
            }
            if registry.active.contains_key(&id) {
                return Err(OrchestratorError::DuplicateExecution(id));
            }
            registry.active.insert(
                id.clone(),
                ActiveExecution {
                    execution: cell.clone(),
                    cancel: cancel_tx,
                },
            );
        }

        tracing::info!(execution_id = %id, application = %application, "execution admitted");

        let runner = Runner::new(self.shared.clone(), cell, cancel_rx);
        let task = tokio::spawn(runner.run());

        Ok(ExecutionHandle { id, task })
    }

    /// Snapshot of an execution, active or archived.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::ExecutionNotFound` for an unknown id or one
    /// already evicted from history.
    pub fn execution(&self, id: &ExecutionId) -> Result<Execution, OrchestratorError> {
        let registry = self.shared.registry.lock();
        if let Some(record) = registry.active.get(id) {
            return Ok(record.execution.lock().clone());
        }

        registry
            .history
            .values()
            .flat_map(|h| h.iter())
            .find(|e| e.id() == id)
            .cloned()
            .ok_or_else(|| OrchestratorError::ExecutionNotFound(id.clone()))
    }

    pub fn get_status(&self, id: &ExecutionId) -> Option<Execution> {
        self.execution(id).ok()
    }

    /// Cancel a running execution.
    ///
    /// The execution becomes CANCELLED immediately. A step already in flight
    /// is not interrupted; the runner stops once it finishes, without
    /// rolling back. Returns false if the execution is unknown, already
    /// terminal, or rolling back.
    pub fn cancel(&self, id: &ExecutionId) -> bool {
        let registry = self.shared.registry.lock();
        let Some(record) = registry.active.get(id) else {
            return false;
        };

        let cancelled = record.execution.lock().cancel().is_ok();
        if cancelled {
            record.cancel.send_replace(true);
            tracing::info!(execution_id = %id, "execution cancelled");
        }
        cancelled
    }

    /// Archived executions of an application, oldest first.
    pub fn get_history(&self, application: &ApplicationId) -> Vec<Execution> {
        self.shared
            .registry
            .lock()
            .history
            .get(application)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshots of every admitted, not yet archived execution.
    pub fn list_active(&self) -> Vec<Execution> {
        self.shared
            .registry
            .lock()
            .active
            .values()
            .map(|record| record.execution.lock().clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.shared.registry.lock().active.len()
    }
}
