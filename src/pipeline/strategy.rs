// ABOUTME: Deployment strategy names carried by pipeline definitions.
// ABOUTME: The orchestrator passes the strategy through to the container service untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy the container service uses to replace running tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategy {
    /// Replace tasks in batches while the service stays up.
    #[default]
    Rolling,

    /// Start the new revision alongside the old one, then switch traffic.
    BlueGreen,

    /// Route a small slice of traffic to the new revision before scaling it up.
    Canary,

    /// Stop the old revision before starting the new one (brief downtime).
    Recreate,
}

impl DeploymentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStrategy::Rolling => "rolling",
            DeploymentStrategy::BlueGreen => "blue_green",
            DeploymentStrategy::Canary => "canary",
            DeploymentStrategy::Recreate => "recreate",
        }
    }

    /// Whether old and new revisions run side by side during the rollout.
    pub fn is_zero_downtime(&self) -> bool {
        !matches!(self, DeploymentStrategy::Recreate)
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rolling" => Ok(DeploymentStrategy::Rolling),
            "blue_green" => Ok(DeploymentStrategy::BlueGreen),
            "canary" => Ok(DeploymentStrategy::Canary),
            "recreate" => Ok(DeploymentStrategy::Recreate),
            other => Err(format!("unknown deployment strategy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hyphenated_and_snake_case() {
        assert_eq!(
            "blue-green".parse::<DeploymentStrategy>().unwrap(),
            DeploymentStrategy::BlueGreen
        );
        assert_eq!(
            "blue_green".parse::<DeploymentStrategy>().unwrap(),
            DeploymentStrategy::BlueGreen
        );
        assert!("big-bang".parse::<DeploymentStrategy>().is_err());
    }

    #[test]
    fn only_recreate_has_downtime() {
        assert!(DeploymentStrategy::Rolling.is_zero_downtime());
        assert!(DeploymentStrategy::Canary.is_zero_downtime());
        assert!(!DeploymentStrategy::Recreate.is_zero_downtime());
    }
}
