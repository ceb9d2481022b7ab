// ABOUTME: Notification sink informed once per finished execution.
// ABOUTME: LogNotifier writes outcomes to tracing instead of an external channel.

use async_trait::async_trait;

use crate::execution::Execution;

use super::ServiceError;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, targets: &[String], execution: &Execution) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, targets: &[String], execution: &Execution) -> Result<(), ServiceError> {
        for target in targets {
            tracing::info!(
                target_channel = %target,
                execution_id = %execution.id(),
                application = %execution.application(),
                status = %execution.status(),
                "deployment finished"
            );
        }
        Ok(())
    }
}
