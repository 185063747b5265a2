//! # Step Runner
//!
//! Executes one ledger call with bounded retry and the event deadline.
//!
//! ## Attempt Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         StepRunner::run                                 │
//! │                                                                         │
//! │   deadline passed? ──yes──► Timeout                                    │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │   call ledger (raced against the deadline)                             │
//! │        │                                                                │
//! │        ├── Ok                          → done                          │
//! │        ├── deadline won the race       → Timeout (write may have landed)│
//! │        ├── ledger call panicked        → Panicked (same)               │
//! │        ├── Storage, retries left       → sleep backoff, loop           │
//! │        └── anything else               → failed                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use cartera_core::error::LedgerResult;
use futures_util::FutureExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::config::SettlementConfig;
use crate::outcome::StepError;

/// How often and how patiently a failed step is re-attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SettlementConfig) -> Self {
        RetryPolicy {
            max_retries: config.engine.max_step_retries,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }

    /// Never re-attempts.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs the steps of one event. Every step shares the event's deadline.
#[derive(Debug, Clone)]
pub struct StepRunner {
    policy: RetryPolicy,
    deadline: Instant,
}

impl StepRunner {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        StepRunner {
            policy,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Calls `op` until it succeeds, fails permanently, runs out of
    /// retries, or the deadline passes.
    pub async fn run<T, F, Fut>(&self, step: &(dyn fmt::Display + Sync), mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut backoff = self.policy.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            if Instant::now() >= self.deadline {
                error!(step = %step, attempt, "Step deadline exceeded");
                return Err(StepError::Timeout);
            }
            attempt += 1;

            let call = AssertUnwindSafe(op()).catch_unwind();
            let result = match timeout_at(self.deadline, call).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    error!(step = %step, attempt, panic = %message, "Step panicked, outcome unknown");
                    return Err(StepError::Panicked(message));
                }
                Err(_) => {
                    error!(step = %step, attempt, "Step timed out, outcome unknown");
                    return Err(StepError::Timeout);
                }
            };

            match result {
                Ok(value) => {
                    debug!(step = %step, attempt, "Step applied");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt <= self.policy.max_retries => {
                    let delay = backoff.next_backoff().unwrap_or(self.policy.max_backoff);
                    warn!(step = %step, attempt, ?delay, error = %err, "Step failed, retrying");

                    let wake = (Instant::now() + delay).min(self.deadline);
                    tokio::time::sleep_until(wake).await;
                }
                Err(err) => {
                    error!(step = %step, attempt, error = %err, "Step failed");
                    return Err(StepError::Ledger(err));
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "ledger call panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Step;
    use cartera_core::error::EntityKind;
    use cartera_core::LedgerError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn step() -> Step {
        Step::AdjustStock {
            product_id: "p-1".into(),
            delta: -1,
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_retries_storage_errors_until_success() {
        let runner = StepRunner::new(fast_policy(3), Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result = runner
            .run(&step(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(LedgerError::storage("database is locked"))
                } else {
                    Ok(7_i64)
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let runner = StepRunner::new(fast_policy(2), Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result: Result<i64, _> = runner
            .run(&step(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::storage("disk I/O error"))
            })
            .await;

        assert_eq!(result, Err(StepError::Ledger(LedgerError::storage("disk I/O error"))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let runner = StepRunner::new(fast_policy(5), Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result: Result<i64, _> = runner
            .run(&step(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::not_found(EntityKind::Product, "p-1"))
            })
            .await;

        assert!(matches!(result, Err(StepError::Ledger(LedgerError::NotFound { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_call_is_a_failed_step() {
        let runner = StepRunner::new(fast_policy(3), Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result = runner
            .run(&step(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < u32::MAX {
                    panic!("Addition overflowed");
                }
                Ok(1_i64)
            })
            .await;

        assert_eq!(result, Err(StepError::Panicked("Addition overflowed".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_cuts_a_slow_step() {
        let runner = StepRunner::new(RetryPolicy::none(), Duration::from_millis(20));

        let result = runner
            .run(&step(), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1_i64)
            })
            .await;

        assert_eq!(result, Err(StepError::Timeout));
    }
}
