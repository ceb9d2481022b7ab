// ABOUTME: Built-in step actions backed by the container and risk collaborators.
// ABOUTME: Also defines the standard, blue_green and canary templates built from them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::risk::RiskAssessment;
use crate::services::{ServiceConfig, TaskDefinitionSpec};

use super::action::{StepAction, StepContext, StepError, StepOutput};
use super::definition::PipelineTemplate;
use super::phase::Phase;
use super::step::Step;
use super::strategy::DeploymentStrategy;

/// Actions templates can reference by name, e.g. from YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuiltinAction {
    /// Check the pipeline carries what later steps need.
    ValidateConfiguration,

    /// Register a task definition for the version being deployed.
    RegisterTaskDefinition {
        /// Defaults to `<application>:<version>`.
        #[serde(default)]
        image: Option<String>,
        #[serde(default = "default_cpu")]
        cpu: u32,
        #[serde(default = "default_memory_mb")]
        memory_mb: u32,
    },

    /// Query the risk service and produce an advisory assessment.
    AssessRisk,

    /// Roll the service onto the version.
    DeployService {
        #[serde(default = "default_desired_count")]
        desired_count: u32,
    },

    /// Set the service's desired task count.
    ScaleService { count: u32 },

    /// Fail unless the service is active with enough running tasks.
    VerifyService {
        #[serde(default = "default_min_running")]
        min_running: u32,
    },

    /// Let the new revision bake before moving on.
    Wait {
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },

    /// Summarize the rollout.
    Finalize,
}

fn default_cpu() -> u32 {
    256
}

fn default_memory_mb() -> u32 {
    512
}

fn default_desired_count() -> u32 {
    2
}

fn default_min_running() -> u32 {
    1
}

#[async_trait]
impl StepAction for BuiltinAction {
    async fn run(&self, ctx: &StepContext) -> Result<StepOutput, StepError> {
        match self {
            BuiltinAction::ValidateConfiguration => validate_configuration(ctx),
            BuiltinAction::RegisterTaskDefinition {
                image,
                cpu,
                memory_mb,
            } => {
                let spec = TaskDefinitionSpec {
                    image: image
                        .clone()
                        .unwrap_or_else(|| format!("{}:{}", ctx.application, ctx.version)),
                    version: ctx.version.clone(),
                    cpu: *cpu,
                    memory_mb: *memory_mb,
                    environment: ctx.environment.clone(),
                };
                let reference = ctx
                    .services
                    .container
                    .create_task_definition(&ctx.application, &spec)
                    .await?;
                Ok(StepOutput::new(format!("registered task definition {reference}"))
                    .with_details(json!({ "task_definition": reference, "image": spec.image })))
            }
            BuiltinAction::AssessRisk => Ok(assess_risk(ctx).await),
            BuiltinAction::DeployService { desired_count } => {
                let config = ServiceConfig {
                    service: ctx.service_name(),
                    version: ctx.version.clone(),
                    desired_count: *desired_count,
                    environment: ctx.environment.clone(),
                };
                let result = ctx
                    .services
                    .container
                    .deploy_service(&ctx.application, &config, ctx.strategy)
                    .await?;
                Ok(StepOutput::new(format!(
                    "deployed {} {} ({} running, {} pending)",
                    config.service, config.version, result.running_count, result.pending_count
                ))
                .with_details(json!(result)))
            }
            BuiltinAction::ScaleService { count } => {
                let result = ctx
                    .services
                    .container
                    .scale_service(&ctx.application, &ctx.service_name(), *count)
                    .await?;
                Ok(StepOutput::new(format!(
                    "scaled {} from {} to {}",
                    result.service, result.previous_count, result.desired_count
                ))
                .with_details(json!(result)))
            }
            BuiltinAction::VerifyService { min_running } => {
                let status = ctx
                    .services
                    .container
                    .get_service_status(&ctx.service_name())
                    .await?;
                if !status.is_healthy() || status.running_count < *min_running {
                    return Err(StepError::failed(format!(
                        "service {} is {:?} with {}/{} tasks running",
                        status.service, status.status, status.running_count, status.desired_count
                    )));
                }
                Ok(
                    StepOutput::new(format!("{} healthy", status.service))
                        .with_details(json!(status)),
                )
            }
            BuiltinAction::Wait { duration } => {
                tokio::time::sleep(*duration).await;
                Ok(StepOutput::new(format!("waited {duration:?}")))
            }
            BuiltinAction::Finalize => Ok(StepOutput::new(format!(
                "{} {} rolled out to {}",
                ctx.application, ctx.version, ctx.environment
            ))),
        }
    }

    fn describe(&self) -> String {
        let kind = match self {
            BuiltinAction::ValidateConfiguration => "validate_configuration",
            BuiltinAction::RegisterTaskDefinition { .. } => "register_task_definition",
            BuiltinAction::AssessRisk => "assess_risk",
            BuiltinAction::DeployService { .. } => "deploy_service",
            BuiltinAction::ScaleService { .. } => "scale_service",
            BuiltinAction::VerifyService { .. } => "verify_service",
            BuiltinAction::Wait { .. } => "wait",
            BuiltinAction::Finalize => "finalize",
        };
        kind.to_string()
    }
}

fn validate_configuration(ctx: &StepContext) -> Result<StepOutput, StepError> {
    if ctx.version.trim().is_empty() {
        return Err(StepError::failed("version is empty"));
    }
    if ctx.environment.trim().is_empty() {
        return Err(StepError::failed("environment is empty"));
    }
    Ok(StepOutput::new(format!(
        "{} {} targets {} via {}",
        ctx.application, ctx.version, ctx.environment, ctx.strategy
    )))
}

/// Longest the risk service is given, whatever the step's own timeout.
const RISK_QUERY_LIMIT: Duration = Duration::from_secs(10);

/// Never fails: an unreachable or silent risk service yields the fallback
/// assessment. The query gets half the step's timeout so the step itself
/// never times out waiting on it.
async fn assess_risk(ctx: &StepContext) -> StepOutput {
    let limit = (ctx.timeout / 2).min(RISK_QUERY_LIMIT);
    let query = ctx.services.risk.get_insights(&ctx.application);
    let assessment = match tokio::time::timeout(limit, query).await {
        Ok(Ok(insights)) => RiskAssessment::from_insights(&insights),
        Ok(Err(e)) => {
            tracing::warn!(
                execution_id = %ctx.execution_id,
                application = %ctx.application,
                "risk service unavailable, using default assessment: {}",
                e
            );
            RiskAssessment::unavailable()
        }
        Err(_elapsed) => {
            tracing::warn!(
                execution_id = %ctx.execution_id,
                application = %ctx.application,
                "risk service did not answer within {:?}, using default assessment",
                limit
            );
            RiskAssessment::unavailable()
        }
    };

    StepOutput::new(format!(
        "risk {} (score {:.2})",
        assessment.level, assessment.score
    ))
    .with_details(json!({
        "approval_recommended": assessment.approval_recommended,
        "confidence": assessment.confidence,
    }))
    .with_risk_assessment(assessment)
}

/// The templates every registry starts with.
pub(crate) fn templates() -> Vec<(&'static str, PipelineTemplate)> {
    let candidates = [
        (
            "standard",
            PipelineTemplate::new(DeploymentStrategy::Rolling, standard_steps(2)).map(|t| {
                t.with_description("Rolling deployment with risk assessment and health validation")
            }),
        ),
        (
            "blue_green",
            PipelineTemplate::new(DeploymentStrategy::BlueGreen, standard_steps(2)).map(|t| {
                t.with_description("Blue-green deployment gated on manual approval")
                    .with_approval_required(true)
            }),
        ),
        (
            "canary",
            PipelineTemplate::new(DeploymentStrategy::Canary, canary_steps(4)).map(|t| {
                t.with_description("Single-task canary, bake period, then scale to full capacity")
            }),
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, template)| match template {
            Ok(template) => Some((name, template)),
            Err(e) => {
                tracing::error!(template = name, "built-in template is invalid, skipping: {}", e);
                None
            }
        })
        .collect()
}

fn preparation_steps() -> Vec<Step> {
    vec![
        Step::new(
            "validate_configuration",
            Phase::Preparation,
            BuiltinAction::ValidateConfiguration,
        )
        .description("Validate deployment configuration")
        .timeout(Duration::from_secs(30)),
        Step::new(
            "register_task_definition",
            Phase::Preparation,
            BuiltinAction::RegisterTaskDefinition {
                image: None,
                cpu: default_cpu(),
                memory_mb: default_memory_mb(),
            },
        )
        .description("Register the task definition for this version")
        .timeout(Duration::from_secs(120))
        .retries(2),
        Step::new("assess_risk", Phase::PreDeployment, BuiltinAction::AssessRisk)
            .description("Assess deployment risk from recent insights")
            .timeout(Duration::from_secs(60)),
    ]
}

fn standard_steps(desired_count: u32) -> Vec<Step> {
    let mut steps = preparation_steps();
    steps.extend([
        Step::new(
            "deploy_service",
            Phase::Deployment,
            BuiltinAction::DeployService { desired_count },
        )
        .description("Deploy the new revision")
        .with_rollback(BuiltinAction::ScaleService { count: 0 })
        .timeout(Duration::from_secs(600))
        .retries(1),
        Step::new(
            "verify_service",
            Phase::PostDeployment,
            BuiltinAction::VerifyService {
                min_running: desired_count,
            },
        )
        .description("Verify all tasks are running")
        .timeout(Duration::from_secs(300))
        .retries(3),
        Step::new(
            "validate_health",
            Phase::Validation,
            BuiltinAction::VerifyService { min_running: 1 },
        )
        .description("Confirm the service is healthy")
        .timeout(Duration::from_secs(300))
        .retries(2),
        Step::new("finalize", Phase::Completion, BuiltinAction::Finalize)
            .description("Record the completed rollout")
            .optional(),
    ]);
    steps
}

fn canary_steps(full_count: u32) -> Vec<Step> {
    let mut steps = preparation_steps();
    steps.extend([
        Step::new(
            "deploy_canary",
            Phase::Deployment,
            BuiltinAction::DeployService { desired_count: 1 },
        )
        .description("Deploy a single canary task")
        .with_rollback(BuiltinAction::ScaleService { count: 0 })
        .timeout(Duration::from_secs(600))
        .retries(1),
        Step::new(
            "bake_canary",
            Phase::PostDeployment,
            BuiltinAction::Wait {
                duration: Duration::from_secs(60),
            },
        )
        .description("Let the canary take traffic")
        .timeout(Duration::from_secs(120)),
        Step::new(
            "verify_canary",
            Phase::PostDeployment,
            BuiltinAction::VerifyService { min_running: 1 },
        )
        .description("Verify the canary is healthy")
        .retries(2),
        Step::new(
            "scale_to_full",
            Phase::PostDeployment,
            BuiltinAction::ScaleService { count: full_count },
        )
        .description("Scale the new revision to full capacity")
        .with_rollback(BuiltinAction::ScaleService { count: 1 })
        .timeout(Duration::from_secs(600)),
        Step::new(
            "validate_health",
            Phase::Validation,
            BuiltinAction::VerifyService {
                min_running: full_count,
            },
        )
        .description("Confirm full capacity is healthy")
        .retries(2),
        Step::new("finalize", Phase::Completion, BuiltinAction::Finalize)
            .description("Record the completed rollout")
            .optional(),
    ]);
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        ContainerOperation, Insight, InsightPriority, SimulatedContainerService, StaticRiskService,
    };
    use crate::pipeline::Services;
    use crate::types::{ApplicationId, ExecutionId};
    use std::sync::Arc;

    fn ctx(container: Arc<SimulatedContainerService>, risk: StaticRiskService) -> StepContext {
        StepContext {
            execution_id: ExecutionId::new("exec-1"),
            application: ApplicationId::new("shop").unwrap(),
            version: "3.4.0".into(),
            environment: "staging".into(),
            strategy: DeploymentStrategy::Rolling,
            step: "test".into(),
            timeout: Duration::from_secs(60),
            services: Services {
                container,
                risk: Arc::new(risk),
            },
        }
    }

    #[test]
    fn builtin_templates_are_valid() {
        let names: Vec<_> = templates().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["standard", "blue_green", "canary"]);
    }

    #[test]
    fn actions_parse_from_tagged_yaml() {
        let action: BuiltinAction = serde_yaml::from_str("kind: wait\nduration: 30s").unwrap();
        assert_eq!(
            action,
            BuiltinAction::Wait {
                duration: Duration::from_secs(30)
            }
        );

        let action: BuiltinAction = serde_yaml::from_str("kind: deploy_service").unwrap();
        assert_eq!(action, BuiltinAction::DeployService { desired_count: 2 });
    }

    #[tokio::test]
    async fn deploy_then_verify_uses_environment_service_name() {
        let container = Arc::new(SimulatedContainerService::new());
        let ctx = ctx(container.clone(), StaticRiskService::default());

        BuiltinAction::DeployService { desired_count: 3 }
            .run(&ctx)
            .await
            .unwrap();
        assert!(container.service("shop-staging").is_some());

        let out = BuiltinAction::VerifyService { min_running: 3 }
            .run(&ctx)
            .await
            .unwrap();
        assert!(out.summary.contains("healthy"));
    }

    #[tokio::test]
    async fn verify_fails_for_scaled_down_service() {
        let container = Arc::new(SimulatedContainerService::new());
        let ctx = ctx(container.clone(), StaticRiskService::default());

        BuiltinAction::DeployService { desired_count: 2 }
            .run(&ctx)
            .await
            .unwrap();
        BuiltinAction::ScaleService { count: 0 }
            .run(&ctx)
            .await
            .unwrap();

        assert!(
            BuiltinAction::VerifyService { min_running: 1 }
                .run(&ctx)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn container_failures_surface_as_step_failures() {
        let container = Arc::new(SimulatedContainerService::new());
        container.fail(ContainerOperation::CreateTaskDefinition);
        let ctx = ctx(container, StaticRiskService::default());

        let err = BuiltinAction::RegisterTaskDefinition {
            image: None,
            cpu: 256,
            memory_mb: 512,
        }
        .run(&ctx)
        .await
        .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn assess_risk_attaches_assessment() {
        let container = Arc::new(SimulatedContainerService::new());
        let risk = StaticRiskService::new(vec![
            Insight::new(InsightPriority::Critical, "error budget exhausted"),
            Insight::new(InsightPriority::Critical, "open incident"),
        ]);
        let out = BuiltinAction::AssessRisk
            .run(&ctx(container, risk))
            .await
            .unwrap();

        let assessment = out.risk_assessment.unwrap();
        assert!(assessment.approval_recommended);
        assert_eq!(assessment.factors.len(), 2);
    }

    #[tokio::test]
    async fn assess_risk_degrades_when_service_is_down() {
        let container = Arc::new(SimulatedContainerService::new());
        let out = BuiltinAction::AssessRisk
            .run(&ctx(container, StaticRiskService::unavailable()))
            .await
            .unwrap();

        let assessment = out.risk_assessment.unwrap();
        let fallback = RiskAssessment::unavailable();
        assert_eq!(assessment.level, fallback.level);
        assert_eq!(assessment.confidence, fallback.confidence);
        assert_eq!(assessment.factors, fallback.factors);
    }
    struct Silent;

    #[async_trait]
    impl crate::services::RiskScoringService for Silent {
        async fn get_insights(
            &self,
            _application: &ApplicationId,
        ) -> Result<Vec<Insight>, crate::services::ServiceError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn assess_risk_gives_up_on_a_silent_service_before_the_step_times_out() {
        let mut ctx = ctx(
            Arc::new(SimulatedContainerService::new()),
            StaticRiskService::default(),
        );
        ctx.services.risk = Arc::new(Silent);
        ctx.timeout = Duration::from_millis(80);

        let started = tokio::time::Instant::now();
        let out = BuiltinAction::AssessRisk.run(&ctx).await.unwrap();

        assert!(started.elapsed() < ctx.timeout);
        assert_eq!(
            out.risk_assessment.unwrap().factors,
            RiskAssessment::unavailable().factors
        );
    }
}
