// ABOUTME: External collaborators the orchestrator consumes through traits.
// ABOUTME: Container scheduler, risk scoring, approval and notification, plus in-memory stand-ins.

mod approval;
mod container;
mod notify;
mod risk;
mod simulated;

pub use approval::{
    ApprovalChannel, ApprovalDecision, ApprovalError, AutoApprovalChannel, ManualApprovalChannel,
};
pub use container::{
    ContainerDeploymentService, DeploymentResult, ScaleResult, ServiceConfig, ServiceError,
    ServiceState, ServiceStatus, TaskDefinitionSpec,
};
pub use notify::{LogNotifier, NotificationSink};
pub use risk::{Insight, InsightPriority, RiskScoringService};
pub use simulated::{
    ContainerCall, ContainerOperation, SimulatedContainerService, StaticRiskService,
};
