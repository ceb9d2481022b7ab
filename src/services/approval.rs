// ABOUTME: Approval channel collaborator and two in-process implementations.
// ABOUTME: ManualApprovalChannel parks waiters until an operator approves or rejects them.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::types::ExecutionId;

/// Operator verdict on a paused execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("approval channel unavailable: {0}")]
    Unavailable(String),
}

/// Blocks until an operator decides on an execution. May wait indefinitely.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn await_approval(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<ApprovalDecision, ApprovalError>;
}

/// Approves every request immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprovalChannel;

#[async_trait]
impl ApprovalChannel for AutoApprovalChannel {
    async fn await_approval(
        &self,
        _execution_id: &ExecutionId,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::Approved)
    }
}

/// Approval resolved out-of-band by calling `approve` or `reject`.
///
/// A decision made before the execution starts waiting is kept and delivered
/// as soon as it does, unless it is withdrawn first. A waiter that gives up
/// (its future is dropped) is removed from the channel.
#[derive(Debug, Default)]
pub struct ManualApprovalChannel {
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    waiting: HashMap<ExecutionId, oneshot::Sender<ApprovalDecision>>,
    decided: HashMap<ExecutionId, ApprovalDecision>,
}

impl ManualApprovalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions currently parked on this channel.
    pub fn pending(&self) -> Vec<ExecutionId> {
        self.state.lock().waiting.keys().cloned().collect()
    }

    pub fn is_waiting(&self, execution_id: &ExecutionId) -> bool {
        self.state.lock().waiting.contains_key(execution_id)
    }

    pub fn approve(&self, execution_id: &ExecutionId) {
        self.decide(execution_id, ApprovalDecision::Approved);
    }

    pub fn reject(&self, execution_id: &ExecutionId, reason: impl Into<String>) {
        self.decide(
            execution_id,
            ApprovalDecision::Rejected {
                reason: reason.into(),
            },
        );
    }

    /// Drop a decision that no execution has collected yet.
    pub fn withdraw(&self, execution_id: &ExecutionId) -> Option<ApprovalDecision> {
        self.state.lock().decided.remove(execution_id)
    }

    fn decide(&self, execution_id: &ExecutionId, decision: ApprovalDecision) {
        let mut state = self.state.lock();
        match state.waiting.remove(execution_id) {
            Some(tx) => {
                // The waiter may have given up in the meantime; nothing to deliver then.
                let _ = tx.send(decision);
            }
            None => {
                state.decided.insert(execution_id.clone(), decision);
            }
        }
    }
}

/// Removes its execution from the waiting set when the wait ends for any reason.
struct WaitGuard<'a> {
    state: &'a Mutex<ManualState>,
    execution_id: ExecutionId,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().waiting.remove(&self.execution_id);
    }
}

#[async_trait]
impl ApprovalChannel for ManualApprovalChannel {
    async fn await_approval(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<ApprovalDecision, ApprovalError> {
        let rx = {
            let mut state = self.state.lock();
            if let Some(decision) = state.decided.remove(execution_id) {
                return Ok(decision);
            }
            let (tx, rx) = oneshot::channel();
            state.waiting.insert(execution_id.clone(), tx);
            rx
        };
        let _guard = WaitGuard {
            state: &self.state,
            execution_id: execution_id.clone(),
        };

        rx.await
            .map_err(|_| ApprovalError::Unavailable("approval request was dropped".to_string()))
    }
}
