// ABOUTME: Orchestrator limits: admission ceiling, history size and retry backoff.
// ABOUTME: Every field has a default so the section may be omitted entirely.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrchestratorConfig {
    /// Executions allowed to run at once; further submissions are rejected.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,

    /// Finished executions kept per application, oldest evicted first.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Fixed pause between a failed step attempt and its retry.
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,
}

fn default_max_concurrent() -> usize {
    10
}

fn default_history_limit() -> usize {
    50
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(5)
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_concurrent_executions: default_max_concurrent(),
            history_limit: default_history_limit(),
            retry_backoff: default_retry_backoff(),
        }
    }
}
