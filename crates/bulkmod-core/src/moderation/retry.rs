use std::{future::Future, time::Duration};

use tokio::time::sleep;

use crate::{Error, Result};

/// Default number of attempts for one platform call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Decides whether an error is a retryable rate limit and how long to wait.
pub type RetryClassifier = fn(&Error) -> Option<Duration>;

/// Bounded retry on rate-limit signals, shared by every platform call path.
///
/// A rate-limited attempt sleeps `min(suggested, wait_cap)` and tries again,
/// up to `max_attempts` attempts in total. Any other error is returned at once.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub wait_cap: Duration,
    classify: RetryClassifier,
}

impl RetryPolicy {
    pub fn new(wait_cap: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_cap,
            classify: Error::retry_after,
        }
    }

    pub fn with_classifier(mut self, classify: RetryClassifier) -> Self {
        self.classify = classify;
        self
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let Some(suggested) = (self.classify)(&err) else {
                return Err(err);
            };
            if attempt >= self.max_attempts {
                tracing::warn!(
                    attempts = attempt,
                    retry_after = suggested.as_secs(),
                    "rate limit persisted, giving up"
                );
                return Err(err);
            }

            let wait = suggested.min(self.wait_cap);
            tracing::warn!(
                attempt,
                wait_secs = wait.as_secs_f64(),
                "rate limited, backing off"
            );
            sleep(wait).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(25))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn limited_then_ok(calls: &AtomicU32, limited: u32) -> Result<&'static str> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= limited {
            Err(Error::RateLimited(Duration::from_secs(60)))
        } else {
            Ok("done")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_the_fifth_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(2));

        let calls_ref = &calls;
        let out = policy
            .run(move || async move { limited_then_ok(calls_ref, 4) })
            .await;

        assert_eq!(out.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_rate_limits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(2));

        let calls_ref = &calls;
        let out = policy
            .run(move || async move { limited_then_ok(calls_ref, 5) })
            .await;

        assert!(matches!(out, Err(Error::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_are_capped_by_threshold() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(Duration::from_secs(2));
        let start = Instant::now();

        let calls_ref = &calls;
        policy
            .run(move || async move { limited_then_ok(calls_ref, 2) })
            .await
            .unwrap();

        // Two sleeps of min(60s, 2s).
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let calls_ref = &calls;
        let out: Result<()> = policy
            .run(move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(Error::External("USER_ADMIN_INVALID".to_string()))
            })
            .await;

        assert!(matches!(out, Err(Error::External(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_classifier_can_disable_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_classifier(|_| None);

        let calls_ref = &calls;
        let out = policy
            .run(move || async move { limited_then_ok(calls_ref, 1) })
            .await;

        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
