// ABOUTME: In-memory collaborators for demos and tests.
// ABOUTME: The simulated scheduler keeps service state and a journal of every call it received.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::pipeline::DeploymentStrategy;
use crate::types::ApplicationId;

use super::container::{
    ContainerDeploymentService, DeploymentResult, ScaleResult, ServiceConfig, ServiceState,
    ServiceStatus, TaskDefinitionSpec,
};
use super::risk::{Insight, RiskScoringService};
use super::ServiceError;

/// Operations of the container service, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerOperation {
    CreateTaskDefinition,
    DeployService,
    ScaleService,
    GetServiceStatus,
}

/// One call received by the simulated scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCall {
    pub operation: ContainerOperation,
    pub target: String,
}

#[derive(Debug, Default)]
struct SimulatedState {
    services: HashMap<String, ServiceStatus>,
    task_definitions: u32,
    journal: Vec<ContainerCall>,
}

/// A scheduler that converges instantly, unless told to fail or stall.
#[derive(Debug, Default)]
pub struct SimulatedContainerService {
    state: Mutex<SimulatedState>,
    failing: Mutex<HashSet<ContainerOperation>>,
    latency: Duration,
}

impl SimulatedContainerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every future call of `operation` fail.
    pub fn fail(&self, operation: ContainerOperation) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: ContainerOperation) {
        self.failing.lock().remove(&operation);
    }

    pub fn calls(&self) -> Vec<ContainerCall> {
        self.state.lock().journal.clone()
    }

    pub fn calls_of(&self, operation: ContainerOperation) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn service(&self, name: &str) -> Option<ServiceStatus> {
        self.state.lock().services.get(name).cloned()
    }

    async fn enter(&self, operation: ContainerOperation, target: &str) -> Result<(), ServiceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.state.lock().journal.push(ContainerCall {
            operation,
            target: target.to_string(),
        });

        if self.failing.lock().contains(&operation) {
            return Err(ServiceError::Unavailable(format!(
                "simulated {operation:?} failure for {target}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerDeploymentService for SimulatedContainerService {
    async fn create_task_definition(
        &self,
        application: &ApplicationId,
        spec: &TaskDefinitionSpec,
    ) -> Result<String, ServiceError> {
        self.enter(ContainerOperation::CreateTaskDefinition, application.as_str())
            .await?;
        let mut state = self.state.lock();
        state.task_definitions += 1;
        Ok(format!(
            "{}:{}:{}",
            application, spec.version, state.task_definitions
        ))
    }

    async fn deploy_service(
        &self,
        _application: &ApplicationId,
        config: &ServiceConfig,
        _strategy: DeploymentStrategy,
    ) -> Result<DeploymentResult, ServiceError> {
        self.enter(ContainerOperation::DeployService, &config.service)
            .await?;
        let status = ServiceStatus {
            service: config.service.clone(),
            status: ServiceState::Active,
            version: Some(config.version.clone()),
            desired_count: config.desired_count,
            running_count: config.desired_count,
            pending_count: 0,
        };
        self.state
            .lock()
            .services
            .insert(config.service.clone(), status);

        Ok(DeploymentResult {
            status: ServiceState::Active,
            running_count: config.desired_count,
            pending_count: 0,
        })
    }

    async fn scale_service(
        &self,
        _application: &ApplicationId,
        service: &str,
        count: u32,
    ) -> Result<ScaleResult, ServiceError> {
        self.enter(ContainerOperation::ScaleService, service).await?;
        let mut state = self.state.lock();
        let status = state
            .services
            .get_mut(service)
            .ok_or_else(|| ServiceError::NotFound(service.to_string()))?;

        let previous_count = status.desired_count;
        status.desired_count = count;
        status.running_count = count;
        status.pending_count = 0;
        status.status = if count == 0 {
            ServiceState::Inactive
        } else {
            ServiceState::Active
        };

        Ok(ScaleResult {
            service: service.to_string(),
            previous_count,
            desired_count: count,
        })
    }

    async fn get_service_status(&self, service: &str) -> Result<ServiceStatus, ServiceError> {
        self.enter(ContainerOperation::GetServiceStatus, service)
            .await?;
        self.service(service)
            .ok_or_else(|| ServiceError::NotFound(service.to_string()))
    }
}

/// Risk service returning a fixed set of insights, or nothing at all.
#[derive(Debug, Clone, Default)]
pub struct StaticRiskService {
    insights: Vec<Insight>,
    unavailable: bool,
}

impl StaticRiskService {
    pub fn new(insights: Vec<Insight>) -> Self {
        Self {
            insights,
            unavailable: false,
        }
    }

    /// A risk service whose every call fails.
    pub fn unavailable() -> Self {
        Self {
            insights: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl RiskScoringService for StaticRiskService {
    async fn get_insights(&self, application: &ApplicationId) -> Result<Vec<Insight>, ServiceError> {
        if self.unavailable {
            return Err(ServiceError::Unavailable(format!(
                "no risk insights for {application}"
            )));
        }
        Ok(self.insights.clone())
    }
}
