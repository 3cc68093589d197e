//! Bounded retry with fixed backoff for remote lookups

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::bili_api::Classified;
use crate::settings::RetrySettings;

/// Fixed-delay retry schedule
///
/// `max_retries` bounds the retries after the first attempt, shared between
/// rate-limit and network failures. Other classifications are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_delay: Duration,
    pub network_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            rate_limit_delay: settings.rate_limit_delay(),
            network_delay: settings.network_delay(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retrying after `classified`, or `None` if it is terminal
    pub fn delay_for(&self, classified: &Classified) -> Option<Duration> {
        match classified {
            Classified::RateLimited => Some(self.rate_limit_delay),
            Classified::NetworkError(_) => Some(self.network_delay),
            _ => None,
        }
    }

    /// Run `op` until it yields a terminal classification or retries run out
    ///
    /// Returns the last classification seen.
    pub async fn run<F, Fut>(&self, label: &str, mut op: F) -> Classified
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Classified>,
    {
        let mut retries = 0;
        loop {
            let classified = op().await;
            let Some(delay) = self.delay_for(&classified) else {
                return classified;
            };
            if retries >= self.max_retries {
                warn!("{}: giving up after {} retries: {:?}", label, retries, classified);
                return classified;
            }
            retries += 1;
            warn!(
                "{}: {:?}, retry {}/{} in {:?}",
                label, classified, retries, self.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counting(
        calls: &Arc<AtomicU32>,
        outcome: Classified,
    ) -> impl FnMut() -> std::future::Ready<Classified> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(outcome.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retries_twice_with_one_second_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("test", counting(&calls, Classified::RateLimited))
            .await;

        assert_eq!(result, Classified::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_uses_shorter_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = RetryPolicy::default()
            .run("test", counting(&calls, Classified::NetworkError("reset".into())))
            .await;

        assert!(result.is_network_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_classification_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = Classified::ApiError {
            code: -400,
            message: "bad".into(),
        };

        let result = RetryPolicy::default()
            .run("test", counting(&calls, outcome.clone()))
            .await;

        assert_eq!(result, outcome);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = RetryPolicy::default()
            .run("test", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n == 0 {
                    Classified::RateLimited
                } else {
                    Classified::Ok(serde_json::json!({"code": 0}))
                })
            })
            .await;

        assert!(matches!(result, Classified::Ok(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_none_policy_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        RetryPolicy::none()
            .run("test", counting(&calls, Classified::RateLimited))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
