// ABOUTME: The fixed, totally ordered set of pipeline phases.
// ABOUTME: Rollback is an internal phase that never appears in forward order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pipeline stage. Steps are bound to exactly one forward phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preparation,
    PreDeployment,
    Deployment,
    PostDeployment,
    Validation,
    Completion,
    /// Entered from any forward phase when an execution has to be compensated.
    Rollback,
}

impl Phase {
    /// Forward phases in execution order.
    pub const FORWARD: [Phase; 6] = [
        Phase::Preparation,
        Phase::PreDeployment,
        Phase::Deployment,
        Phase::PostDeployment,
        Phase::Validation,
        Phase::Completion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::PreDeployment => "pre_deployment",
            Phase::Deployment => "deployment",
            Phase::PostDeployment => "post_deployment",
            Phase::Validation => "validation",
            Phase::Completion => "completion",
            Phase::Rollback => "rollback",
        }
    }

    pub fn is_forward(&self) -> bool {
        !matches!(self, Phase::Rollback)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_order_is_sorted() {
        let mut sorted = Phase::FORWARD;
        sorted.sort();
        assert_eq!(sorted, Phase::FORWARD);
    }

    #[test]
    fn rollback_is_not_forward() {
        assert!(!Phase::Rollback.is_forward());
        assert!(!Phase::FORWARD.contains(&Phase::Rollback));
    }

    #[test]
    fn phases_deserialize_from_snake_case() {
        let phase: Phase = serde_yaml::from_str("post_deployment").unwrap();
        assert_eq!(phase, Phase::PostDeployment);
    }
}
