// ABOUTME: Risk-scoring collaborator: returns prioritized insights about an application.
// ABOUTME: Scoring those insights happens in crate::risk, not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ApplicationId;

use super::ServiceError;

#[async_trait]
pub trait RiskScoringService: Send + Sync {
    async fn get_insights(&self, application: &ApplicationId) -> Result<Vec<Insight>, ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// One signal from the risk service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub priority: InsightPriority,
    pub title: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Insight {
    pub fn new(priority: InsightPriority, title: impl Into<String>) -> Self {
        Self {
            priority,
            title: title.into(),
            data: serde_json::Value::Null,
        }
    }
}
