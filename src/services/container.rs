// ABOUTME: Container scheduler collaborator consumed by deployment steps.
// ABOUTME: Registers task definitions, deploys and scales services, reports service status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pipeline::DeploymentStrategy;
use crate::types::ApplicationId;

/// Container scheduler operations used by the built-in actions.
#[async_trait]
pub trait ContainerDeploymentService: Send + Sync {
    /// Register a task definition and return its reference.
    async fn create_task_definition(
        &self,
        application: &ApplicationId,
        spec: &TaskDefinitionSpec,
    ) -> Result<String, ServiceError>;

    /// Roll the service onto a new revision.
    async fn deploy_service(
        &self,
        application: &ApplicationId,
        config: &ServiceConfig,
        strategy: DeploymentStrategy,
    ) -> Result<DeploymentResult, ServiceError>;

    /// Set the desired task count of a service.
    async fn scale_service(
        &self,
        application: &ApplicationId,
        service: &str,
        count: u32,
    ) -> Result<ScaleResult, ServiceError>;

    /// Current state of a service.
    async fn get_service_status(&self, service: &str) -> Result<ServiceStatus, ServiceError>;
}

/// Task definition to register for a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub image: String,
    pub version: String,
    pub cpu: u32,
    pub memory_mb: u32,
    pub environment: String,
}

/// Desired shape of a service deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service: String,
    pub version: String,
    pub desired_count: u32,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Active,
    Deploying,
    Draining,
    Inactive,
    Failed,
}

/// Immediate outcome of `deploy_service`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub status: ServiceState,
    pub running_count: u32,
    pub pending_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleResult {
    pub service: String,
    pub previous_count: u32,
    pub desired_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub status: ServiceState,
    pub version: Option<String>,
    pub desired_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
}

impl ServiceStatus {
    /// Active with every desired task running.
    pub fn is_healthy(&self) -> bool {
        self.status == ServiceState::Active && self.running_count >= self.desired_count
    }
}

/// Errors reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("operation rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: ServiceState, desired: u32, running: u32) -> ServiceStatus {
        ServiceStatus {
            service: "api-production".into(),
            status: state,
            version: Some("1.0.0".into()),
            desired_count: desired,
            running_count: running,
            pending_count: desired.saturating_sub(running),
        }
    }

    #[test]
    fn healthy_requires_active_and_full_count() {
        assert!(status(ServiceState::Active, 2, 2).is_healthy());
        assert!(!status(ServiceState::Active, 2, 1).is_healthy());
        assert!(!status(ServiceState::Deploying, 2, 2).is_healthy());
    }
}
