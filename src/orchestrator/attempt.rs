// ABOUTME: Runs one step's action under its timeout, retrying within the step's budget.
// ABOUTME: Panics inside an action are caught and reported as internal faults.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;

use crate::pipeline::{Step, StepAction, StepContext, StepError, StepOutput};

/// Final outcome of a step after all attempts.
#[derive(Debug)]
pub(crate) struct AttemptReport {
    pub outcome: Result<StepOutput, StepError>,
    pub attempts: u32,
}

/// Run `step` until it succeeds, its budget is spent, or the execution is cancelled.
///
/// Each retry restarts the action from scratch after `backoff`. Internal
/// faults are not retried.
pub(crate) async fn run_with_retries(
    step: &Step,
    ctx: &StepContext,
    backoff: Duration,
    cancelled: &watch::Receiver<bool>,
) -> AttemptReport {
    let mut remaining = step.retries;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let err = match run_once(step.action.as_ref(), ctx, step.timeout).await {
            Ok(output) => {
                return AttemptReport {
                    outcome: Ok(output),
                    attempts,
                };
            }
            Err(err) => err,
        };

        if remaining == 0 || !err.is_retryable() || *cancelled.borrow() {
            return AttemptReport {
                outcome: Err(err),
                attempts,
            };
        }

        remaining -= 1;
        tracing::warn!(
            execution_id = %ctx.execution_id,
            step = %step.name,
            attempt = attempts,
            remaining,
            "step attempt failed, retrying: {}",
            err
        );
        if !backoff.is_zero() {
            let mut cancelled = cancelled.clone();
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                Ok(_) = cancelled.wait_for(|c| *c) => {}
            }
        }
        if *cancelled.borrow() {
            tracing::debug!(
                execution_id = %ctx.execution_id,
                step = %step.name,
                "cancelled during backoff, not retrying"
            );
            return AttemptReport {
                outcome: Err(err),
                attempts,
            };
        }
    }
}

/// A single bounded attempt of `action`.
pub(crate) async fn run_once(
    action: &dyn StepAction,
    ctx: &StepContext,
    timeout: Duration,
) -> Result<StepOutput, StepError> {
    let attempt = AssertUnwindSafe(action.run(ctx)).catch_unwind();
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => Err(StepError::Panicked {
            message: panic_message(panic.as_ref()),
        }),
        Err(_elapsed) => Err(StepError::TimedOut { timeout }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DeploymentStrategy, Phase, Services};
    use crate::services::{SimulatedContainerService, StaticRiskService};
    use crate::types::{ApplicationId, ExecutionId};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    }

    #[async_trait]
    impl StepAction for Flaky {
        async fn run(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(StepOutput::new(format!("attempt {n}")))
            } else {
                Err(StepError::failed(format!("attempt {n} failed")))
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl StepAction for Slow {
        async fn run(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(StepOutput::new("too late"))
        }
    }

    struct Panicky;

    #[async_trait]
    impl StepAction for Panicky {
        async fn run(&self, _ctx: &StepContext) -> Result<StepOutput, StepError> {
            panic!("invariant violated");
        }
    }

    fn ctx() -> StepContext {
        StepContext {
            execution_id: ExecutionId::new("e"),
            application: ApplicationId::new("app").unwrap(),
            version: "1".into(),
            environment: "test".into(),
            strategy: DeploymentStrategy::Rolling,
            step: "s".into(),
            timeout: Duration::from_secs(5),
            services: Services {
                container: Arc::new(SimulatedContainerService::new()),
                risk: Arc::new(StaticRiskService::default()),
            },
        }
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        // The last value stays readable after the sender is dropped.
        watch::channel(false).1
    }

    #[tokio::test]
    async fn succeeds_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Step::new(
            "flaky",
            Phase::Deployment,
            Flaky {
                calls: calls.clone(),
                succeed_on: 3,
            },
        )
        .retries(2);

        let report = run_with_retries(&step, &ctx(), Duration::ZERO, &not_cancelled()).await;
        assert!(report.outcome.is_ok());
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Step::new(
            "flaky",
            Phase::Deployment,
            Flaky {
                calls: calls.clone(),
                succeed_on: u32::MAX,
            },
        )
        .retries(1);

        let report = run_with_retries(&step, &ctx(), Duration::ZERO, &not_cancelled()).await;
        assert_eq!(report.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            report.outcome.unwrap_err(),
            StepError::failed("attempt 2 failed")
        );
    }

    #[tokio::test]
    async fn timeout_is_a_failure_outcome() {
        let err = run_once(&Slow, &ctx(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StepError::TimedOut {
                timeout: Duration::from_millis(20)
            }
        );
    }

    #[tokio::test]
    async fn panics_are_caught_and_not_retried() {
        let step = Step::new("boom", Phase::Deployment, Panicky).retries(5);
        let report = run_with_retries(&step, &ctx(), Duration::ZERO, &not_cancelled()).await;
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.outcome.unwrap_err(),
            StepError::Panicked {
                message: "invariant violated".into()
            }
        );
    }

    #[tokio::test]
    async fn cancellation_stops_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Step::new(
            "flaky",
            Phase::Deployment,
            Flaky {
                calls: calls.clone(),
                succeed_on: u32::MAX,
            },
        )
        .retries(10);
        let (_tx, rx) = watch::channel(true);

        let report = run_with_retries(&step, &ctx(), Duration::ZERO, &rx).await;
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_skips_next_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let step = Step::new(
            "flaky",
            Phase::Deployment,
            Flaky {
                calls: calls.clone(),
                succeed_on: u32::MAX,
            },
        )
        .retries(3);
        let (tx, rx) = watch::channel(false);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send_replace(true);
            tx
        });
        let started = tokio::time::Instant::now();
        let report = run_with_retries(&step, &ctx(), Duration::from_secs(30), &rx).await;
        let _tx = canceller.await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(report.outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
