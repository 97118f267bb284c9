//! Exponential backoff around fallible async calls.
//!
//! The interval starts at [`RetryPolicy::initial_interval`], is multiplied by
//! [`RetryPolicy::multiplier`] after every failure and never exceeds
//! [`RetryPolicy::max_interval`]. Retrying stops at whichever comes first:
//! `max_retries` retries, or a next sleep that would end past `max_elapsed`.
//! The last error is then returned unchanged.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (zero based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(64) as i32);
        let nanos = (self.initial_interval.as_nanos() as f64 * factor).round();
        let cap = self.max_interval.as_nanos();
        if !nanos.is_finite() || nanos >= cap as f64 {
            return self.max_interval;
        }
        Duration::from_nanos(nanos as u64)
    }
}

/// Run `operation` until it succeeds or the policy gives up.
///
/// `notify` is called with the error and the upcoming backoff before each sleep.
pub async fn retry<T, E, F, Fut, N>(policy: &RetryPolicy, mut operation: F, mut notify: N) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: FnMut(&E, Duration),
{
    let started = Instant::now();
    let mut retries = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if retries >= policy.max_retries {
            return Err(err);
        }
        let backoff = policy.backoff(retries);
        if started.elapsed() + backoff > policy.max_elapsed {
            return Err(err);
        }

        notify(&err, backoff);
        sleep(backoff).await;
        retries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_millis(350),
            max_elapsed: Duration::from_secs(10),
            max_retries: 10,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(350));
        assert_eq!(policy.backoff(8), Duration::from_millis(350));
    }
}
