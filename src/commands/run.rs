// ABOUTME: Run command implementation.
// ABOUTME: Executes one pipeline against the simulated scheduler and reports its outcome.

use async_trait::async_trait;
use rollout::config::Config;
use rollout::error::{Error, Result};
use rollout::execution::ExecutionStatus;
use rollout::orchestrator::{Collaborators, Orchestrator};
use rollout::output::Output;
use rollout::pipeline::PipelineOverrides;
use rollout::services::{
    ApprovalChannel, ApprovalDecision, ApprovalError, AutoApprovalChannel, ContainerOperation,
    SimulatedContainerService, StaticRiskService,
};
use rollout::types::{ApplicationId, ExecutionId};
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Arguments of a single `rollout run`.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub application: String,
    pub version: String,
    pub template: String,
    pub environment: Option<String>,
    pub auto_approve: bool,
    pub no_rollback: bool,
    pub fail: Vec<ContainerOperation>,
}

/// Run one pipeline to completion.
pub async fn run(config: Config, request: RunRequest, mut output: Output) -> Result<()> {
    output.start_timer();

    let application = ApplicationId::new(&request.application)?;
    let registry = config.registry()?;

    let container = Arc::new(SimulatedContainerService::new());
    for operation in &request.fail {
        container.fail(*operation);
    }
    let approval: Arc<dyn ApprovalChannel> = if request.auto_approve {
        Arc::new(AutoApprovalChannel)
    } else {
        Arc::new(PromptApproval)
    };
    let collaborators = Collaborators::new(
        container,
        Arc::new(StaticRiskService::new(Vec::new())),
        approval,
    );
    let orchestrator = Orchestrator::new(config.orchestrator.clone(), registry, collaborators);

    let overrides = PipelineOverrides {
        environment: request.environment.clone(),
        auto_rollback: request.no_rollback.then_some(false),
        ..Default::default()
    };
    let pipeline = orchestrator.create_pipeline(
        application,
        request.version.clone(),
        &request.template,
        &overrides,
    )?;

    output.progress(&format!(
        "Deploying {} {} to {} with the {} pipeline ({} steps)",
        pipeline.application(),
        pipeline.version(),
        pipeline.environment(),
        request.template,
        pipeline.steps().len()
    ));

    let handle = orchestrator.execute(pipeline, request.auto_approve)?;
    let execution = handle.wait().await?;
    output.execution(&execution);

    for result in execution.rollback_results().iter().filter(|r| !r.success) {
        output.warning(&format!(
            "rollback of {} failed: {}",
            result.step,
            result.error.as_deref().unwrap_or("unknown error")
        ));
    }

    match execution.status() {
        ExecutionStatus::Completed => {
            output.success("Deployment complete!");
            Ok(())
        }
        status => Err(Error::DeploymentFailed {
            status: status.to_string(),
            reason: execution
                .error_message()
                .unwrap_or("no reason recorded")
                .to_string(),
        }),
    }
}

/// Asks the operator on the terminal. Anything but "y"/"yes" rejects.
struct PromptApproval;

#[async_trait]
impl ApprovalChannel for PromptApproval {
    async fn await_approval(
        &self,
        execution_id: &ExecutionId,
    ) -> std::result::Result<ApprovalDecision, ApprovalError> {
        let execution_id = execution_id.clone();
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("Approve deployment {execution_id}? [y/N] ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok::<_, std::io::Error>(line)
        })
        .await
        .map_err(|e| ApprovalError::Unavailable(e.to_string()))?
        .map_err(|e| ApprovalError::Unavailable(e.to_string()))?;

        Ok(match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => ApprovalDecision::Approved,
            _ => ApprovalDecision::Rejected {
                reason: "declined by operator".to_string(),
            },
        })
    }
}
