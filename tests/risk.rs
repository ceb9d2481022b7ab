// ABOUTME: Property tests for the risk score mapping.
// ABOUTME: Checks score bounds, level thresholds and the approval recommendation.

use proptest::prelude::*;
use rollout::risk::{RiskAssessment, RiskLevel};
use rollout::services::{Insight, InsightPriority};

fn priority() -> impl Strategy<Value = InsightPriority> {
    prop_oneof![
        Just(InsightPriority::Low),
        Just(InsightPriority::Medium),
        Just(InsightPriority::High),
        Just(InsightPriority::Critical),
    ]
}

fn insights() -> impl Strategy<Value = Vec<Insight>> {
    prop::collection::vec(
        (priority(), "[a-z]{1,12}").prop_map(|(p, title)| Insight::new(p, title)),
        0..12,
    )
}

fn expected_score(insights: &[Insight]) -> f64 {
    let critical = insights
        .iter()
        .filter(|i| i.priority == InsightPriority::Critical)
        .count();
    let high = insights
        .iter()
        .filter(|i| i.priority == InsightPriority::High)
        .count();
    (0.1 + 0.3 * critical as f64 + 0.2 * high as f64).min(1.0)
}

proptest! {
    #[test]
    fn score_stays_within_bounds(insights in insights()) {
        let a = RiskAssessment::from_insights(&insights);
        prop_assert!(a.score >= 0.1 - 1e-9);
        prop_assert!(a.score <= 1.0 + 1e-9);
    }

    #[test]
    fn score_follows_priority_weights(insights in insights()) {
        let a = RiskAssessment::from_insights(&insights);
        prop_assert!((a.score - expected_score(&insights)).abs() < 1e-6);
    }

    #[test]
    fn level_matches_score_thresholds(insights in insights()) {
        let a = RiskAssessment::from_insights(&insights);
        prop_assert_eq!(a.level, RiskLevel::from_score(a.score));
        prop_assert_eq!(a.approval_recommended, a.score > 0.6);
        prop_assert!(!a.mitigations.is_empty());
    }

    #[test]
    fn low_and_medium_insights_never_raise_the_score(count in 0usize..20) {
        let quiet: Vec<_> = (0..count)
            .map(|n| Insight::new(if n % 2 == 0 { InsightPriority::Low } else { InsightPriority::Medium }, "noise"))
            .collect();
        let a = RiskAssessment::from_insights(&quiet);
        prop_assert_eq!(a.level, RiskLevel::Low);
        prop_assert!(a.factors.is_empty());
    }

    #[test]
    fn more_critical_findings_never_lower_the_level(base in insights()) {
        let before = RiskAssessment::from_insights(&base);
        let mut more = base.clone();
        more.push(Insight::new(InsightPriority::Critical, "incident"));
        let after = RiskAssessment::from_insights(&more);
        prop_assert!(after.level >= before.level);
        prop_assert!(after.score >= before.score);
    }
}

#[test]
fn thresholds_are_inclusive_lower_bounds() {
    assert_eq!(RiskLevel::from_score(0.39), RiskLevel::Low);
    assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
    assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
    assert_eq!(RiskLevel::from_score(0.8), RiskLevel::Critical);
    assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
}
