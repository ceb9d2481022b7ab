// ABOUTME: Advisory risk assessment computed from risk-service insights.
// ABOUTME: Maps insight priorities to a clamped score, a level, and suggested mitigations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::{Insight, InsightPriority};

// Weights in hundredths so the sums stay exact before the final division.
const BASE_POINTS: usize = 10;
const CRITICAL_POINTS: usize = 30;
const HIGH_POINTS: usize = 20;
const MAX_POINTS: usize = 100;
const APPROVAL_THRESHOLD: f64 = 0.6;

const ASSESSED_CONFIDENCE: f64 = 0.8;
const FALLBACK_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// LOW < 0.4 <= MEDIUM < 0.6 <= HIGH < 0.8 <= CRITICAL
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            RiskLevel::Critical
        } else if score >= 0.6 {
            RiskLevel::High
        } else if score >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn mitigations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            RiskLevel::Low => &["Standard monitoring during rollout"],
            RiskLevel::Medium => &[
                "Monitor error rates closely after deployment",
                "Keep the previous revision available for rollback",
            ],
            RiskLevel::High => &[
                "Prefer a canary or blue-green rollout",
                "Obtain manual approval before deployment",
                "Keep the previous revision available for rollback",
            ],
            RiskLevel::Critical => &[
                "Postpone the deployment until critical findings are resolved",
                "Obtain manual approval before deployment",
                "Prefer a canary or blue-green rollout",
                "Staff an on-call engineer for the rollout window",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Risk of deploying a version, computed once per execution.
///
/// The assessment is advisory: `approval_recommended` never changes whether
/// the pipeline actually waits for approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
    pub factors: Vec<String>,
    pub mitigations: Vec<String>,
    pub approval_recommended: bool,
    pub confidence: f64,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// Score insights: 0.1 base, +0.3 per critical, +0.2 per high, clamped to 1.0.
    pub fn from_insights(insights: &[Insight]) -> Self {
        let critical = insights
            .iter()
            .filter(|i| i.priority == InsightPriority::Critical)
            .count();
        let high = insights
            .iter()
            .filter(|i| i.priority == InsightPriority::High)
            .count();

        let score = score_for(critical, high);
        let level = RiskLevel::from_score(score);
        let factors = insights
            .iter()
            .filter(|i| matches!(i.priority, InsightPriority::Critical | InsightPriority::High))
            .map(|i| i.title.clone())
            .collect();

        RiskAssessment {
            level,
            score,
            factors,
            mitigations: level.mitigations(),
            approval_recommended: score > APPROVAL_THRESHOLD,
            confidence: ASSESSED_CONFIDENCE,
            assessed_at: Utc::now(),
        }
    }

    /// Stand-in used when the risk service cannot be reached.
    pub fn unavailable() -> Self {
        RiskAssessment {
            level: RiskLevel::Low,
            score: score_for(0, 0),
            factors: vec!["risk service unavailable".to_string()],
            mitigations: RiskLevel::Low.mitigations(),
            approval_recommended: false,
            confidence: FALLBACK_CONFIDENCE,
            assessed_at: Utc::now(),
        }
    }
}

fn score_for(critical: usize, high: usize) -> f64 {
    let points = BASE_POINTS
        .saturating_add(CRITICAL_POINTS.saturating_mul(critical))
        .saturating_add(HIGH_POINTS.saturating_mul(high))
        .min(MAX_POINTS);
    points as f64 / MAX_POINTS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insights(critical: usize, high: usize, low: usize) -> Vec<Insight> {
        let mut out = Vec::new();
        out.extend((0..critical).map(|n| Insight::new(InsightPriority::Critical, format!("c{n}"))));
        out.extend((0..high).map(|n| Insight::new(InsightPriority::High, format!("h{n}"))));
        out.extend((0..low).map(|n| Insight::new(InsightPriority::Low, format!("l{n}"))));
        out
    }

    #[test]
    fn no_insights_is_low_risk() {
        let a = RiskAssessment::from_insights(&[]);
        assert_eq!(a.level, RiskLevel::Low);
        assert!((a.score - 0.1).abs() < 1e-9);
        assert!(!a.approval_recommended);
        assert!(a.factors.is_empty());
    }

    #[test]
    fn one_critical_and_one_high_is_high() {
        let a = RiskAssessment::from_insights(&insights(1, 1, 3));
        assert!((a.score - 0.6).abs() < 1e-9);
        assert_eq!(a.level, RiskLevel::High);
        // 0.6 is not strictly above the approval threshold.
        assert!(!a.approval_recommended);
        assert_eq!(a.factors, vec!["c0".to_string(), "h0".to_string()]);
    }

    #[test]
    fn many_criticals_clamp_to_one() {
        let a = RiskAssessment::from_insights(&insights(5, 0, 0));
        assert_eq!(a.score, 1.0);
        assert_eq!(a.level, RiskLevel::Critical);
        assert!(a.approval_recommended);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(RiskLevel::from_score(0.39), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.8), RiskLevel::Critical);
    }

    #[test]
    fn unavailable_assessment_is_low_confidence() {
        let a = RiskAssessment::unavailable();
        assert_eq!(a.level, RiskLevel::Low);
        assert!(a.confidence < ASSESSED_CONFIDENCE);
    }
}
