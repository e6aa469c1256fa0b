//! Bounded retry combinator, independent of the operation being retried.

use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::debug;

/// Attempt count and delay schedule for [`retry_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after every failed attempt (1 = fixed delay).
    pub multiplier: u32,
}

impl RetryPolicy {
    /// `attempts` tries separated by a constant `delay`.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
        }
    }

    /// Doubling delays starting at `initial` and capped at `max`.
    pub fn exponential(attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: initial,
            max_delay: max.max(initial),
            multiplier: 2,
        }
    }

    /// Same schedule with a different attempt budget.
    pub fn with_attempts(self, attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..self
        }
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Final result of a bounded retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt produced a value accepted by the predicate.
    Accepted {
        /// Accepted value.
        value: T,
        /// Attempts spent, including the accepted one.
        attempts: u32,
    },
    /// At least one attempt produced a value but none was accepted; carries the last value.
    Rejected {
        /// Last value produced.
        value: T,
        /// Attempts spent.
        attempts: u32,
    },
    /// Every attempt failed; carries the last error.
    Failed {
        /// Last error returned.
        error: E,
        /// Attempts spent.
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Attempts spent.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Run `op` until it yields a value satisfying `accept` or the policy runs out of attempts.
///
/// Errors and rejected values both consume an attempt. When attempts are exhausted, a value
/// from any attempt wins over an error so callers can still salvage partial data.
pub async fn retry_until<T, E, F, Fut, A>(policy: RetryPolicy, mut op: F, accept: A) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: Fn(&T) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut salvaged = None;
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) if accept(&value) => {
                return RetryOutcome::Accepted {
                    value,
                    attempts: attempt,
                };
            }
            Ok(value) => {
                debug!(attempt, "attempt produced an unacceptable value");
                if attempt >= max_attempts {
                    return RetryOutcome::Rejected {
                        value,
                        attempts: attempt,
                    };
                }
                salvaged = Some(value);
            }
            Err(error) => {
                debug!(attempt, error = %error, "attempt failed");
                if attempt >= max_attempts {
                    return match salvaged.take() {
                        Some(value) => RetryOutcome::Rejected {
                            value,
                            attempts: attempt,
                        },
                        None => RetryOutcome::Failed {
                            error,
                            attempts: attempt,
                        },
                    };
                }
            }
        }

        sleep(policy.delay_after(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn exponential_delays_are_capped() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_secs(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(4), Duration::from_secs(8));
        assert_eq!(policy.delay_after(5), Duration::from_secs(10));
    }

    #[test]
    fn fixed_delay_never_grows() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_accepted_value() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<u32, String> = retry_until(
            RetryPolicy::fixed(5, Duration::from_millis(10)),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(attempt) }
            },
            |value| *value == 3,
        )
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Accepted {
                value: 3,
                attempts: 3
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn value_beats_error_when_exhausted() {
        let outcome: RetryOutcome<u32, String> = retry_until(
            RetryPolicy::fixed(3, Duration::from_millis(10)),
            |attempt| async move {
                if attempt == 2 {
                    Ok(7)
                } else {
                    Err(format!("attempt {attempt}"))
                }
            },
            |_| false,
        )
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Rejected {
                value: 7,
                attempts: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_errors_surface_last_error() {
        let outcome: RetryOutcome<u32, String> = retry_until(
            RetryPolicy::fixed(2, Duration::from_millis(10)),
            |attempt| async move { Err(format!("attempt {attempt}")) },
            |_| true,
        )
        .await;

        assert_eq!(
            outcome,
            RetryOutcome::Failed {
                error: "attempt 2".to_string(),
                attempts: 2
            }
        );
    }
}
