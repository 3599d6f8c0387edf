//! Bounded retry loop with exponential backoff and an injectable sleep.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::provider::FundingError;

/// Wait inserted after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Constant(Duration),
    /// `initial * 2^attempt`, capped at `cap`. With `jitter` the result is
    /// drawn uniformly from its lower half up to itself.
    Doubling {
        initial: Duration,
        cap: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Doubling {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Wait after the failed attempt with 0-based index `attempt`.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Constant(delay) => delay,
            Self::Doubling {
                initial,
                cap,
                jitter,
            } => {
                let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
                let delay = initial.saturating_mul(factor).min(cap);
                if !jitter {
                    return delay;
                }
                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                Duration::from_millis(fastrand::u64(millis / 2..=millis))
            }
        }
    }
}

/// Attempt budget and backoff for upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::exponential(3)
    }
}

impl RetryConfig {
    /// Doubling backoff from one second.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::default(),
        }
    }

    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Constant(delay),
        }
    }

    pub fn no_retry() -> Self {
        Self::exponential(1)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Suspends the retry loop between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Wall-clock sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the attempt
/// budget runs out.
///
/// Errors whose [`retryable`](FundingError::retryable) flag is false are
/// returned immediately. A retryable error on the final attempt is surfaced as
/// `MaxRetriesExceeded` carrying its message.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, FundingError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FundingError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.retryable() => return Err(error),
            Err(error) => {
                if attempt + 1 >= max_attempts {
                    tracing::error!(
                        attempts = max_attempts,
                        error = %error,
                        "upstream call failed after exhausting retries"
                    );
                    return Err(FundingError::max_retries_exceeded(max_attempts, &error));
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying upstream call"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FundingErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep<'a>(
            &'a self,
            duration: Duration,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            self.delays
                .lock()
                .expect("delay log should not be poisoned")
                .push(duration);
            Box::pin(async {})
        }
    }

    #[test]
    fn constant_backoff_ignores_attempt() {
        let backoff = Backoff::Constant(Duration::from_millis(100));

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn default_backoff_doubles_from_one_second_up_to_cap() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(10), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn jittered_delay_stays_within_upper_half() {
        let backoff = Backoff::Doubling {
            initial: Duration::from_millis(100),
            cap: Duration::from_secs(1),
            jitter: true,
        };

        for attempt in 0..5 {
            let ceiling = Duration::from_millis(100 << attempt).min(Duration::from_secs(1));
            for _ in 0..10 {
                let delay = backoff.delay(attempt);
                assert!(delay <= ceiling, "attempt={attempt} delay={delay:?}");
                assert!(delay >= ceiling / 2, "attempt={attempt} delay={delay:?}");
            }
        }
    }

    #[test]
    fn default_config_allows_three_attempts() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_transient_failures() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(&RetryConfig::default(), &sleeper, |_| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(FundingError::unavailable("upstream returned status 502"))
                } else {
                    Ok("payload")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.delays.lock().expect("delay log"),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(&RetryConfig::default(), &sleeper, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FundingError::user_not_found("ghost")) }
        })
        .await;

        assert_eq!(
            result.expect_err("must fail").kind(),
            FundingErrorKind::UserNotFound
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().expect("delay log").is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_max_retries_exceeded() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(&RetryConfig::default(), &sleeper, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FundingError::unavailable("connection reset")) }
        })
        .await;

        let error = result.expect_err("must fail");
        assert_eq!(error.kind(), FundingErrorKind::MaxRetriesExceeded);
        assert!(error.message().contains("connection reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays.lock().expect("delay log").len(), 2);
    }
}
