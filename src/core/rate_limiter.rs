//! Minimum-interval gate for rate-restricted external APIs.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between calls to one external resource.
///
/// Share a single instance (behind an `Arc`) between every caller of the
/// resource. The lock is held across the sleep, so concurrent callers are
/// granted slots one at a time, each at least `min_interval` after the
/// previous grant.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::const_new(None),
        }
    }

    /// The configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next call slot and claims it.
    pub async fn wait_if_needed(&self) {
        let mut last_call = self.last_call.lock().await;
        let now = Instant::now();

        let granted = match *last_call {
            Some(last) => {
                let next = last + self.min_interval;
                if next > now {
                    trace!(wait_ms = (next - now).as_millis(), "rate limiter sleeping");
                    tokio::time::sleep_until(next).await;
                    next
                } else {
                    now
                }
            }
            None => now,
        };

        *last_call = Some(granted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(3));
        let start = Instant::now();
        limiter.wait_if_needed().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(3));
        let start = Instant::now();
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        limiter.wait_if_needed().await;
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_period_is_not_banked() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        limiter.wait_if_needed().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let before = Instant::now();
        limiter.wait_if_needed().await;
        assert_eq!(before.elapsed(), Duration::ZERO);

        let before = Instant::now();
        limiter.wait_if_needed().await;
        assert!(before.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_share_an_interval() {
        let interval = Duration::from_millis(500);
        let limiter = Arc::new(RateLimiter::new(interval));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.wait_if_needed().await;
                Instant::now()
            }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap_or_else(|_| unreachable!()));
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
    }
}
