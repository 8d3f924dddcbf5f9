// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Retry policy with exponential backoff
//!
//! The policy is a plain value injected into the run context; whether an
//! error is worth retrying is decided by a classifier supplied at each call
//! site, so transient-versus-permanent rules stay next to the error types.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;
use tracing::warn;

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay (jitter is added on top)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    ///
    /// `min(base * 2^retry, max) + jitter`, jitter uniform in `[0, base)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        let exp = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let base_ms = self.base_delay.as_millis() as u64;
        let jitter = if base_ms > 0 {
            rand::rng().random_range(0..base_ms)
        } else {
            0
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Run `operation` until it succeeds, the classifier aborts, or the attempt
/// ceiling is reached. Returns the last error in the failure cases.
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    policy: &RetryPolicy,
    op_name: &str,
    classify: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if classify(&e) == RetryAction::Abort || attempt >= attempts {
                    return Err(e);
                }
                let delay = policy.delay_for_retry(attempt - 1);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        let d0 = policy.delay_for_retry(0);
        assert!(d0 >= Duration::from_millis(100) && d0 < Duration::from_millis(200));
        let d2 = policy.delay_for_retry(2);
        assert!(d2 >= Duration::from_millis(400) && d2 < Duration::from_millis(500));
        let d9 = policy.delay_for_retry(9);
        assert!(d9 >= Duration::from_millis(1000) && d9 < Duration::from_millis(1100));
        // Huge retry numbers must not overflow.
        let d = policy.delay_for_retry(200);
        assert!(d < Duration::from_millis(1100));
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.delay_for_retry(0), Duration::ZERO);
        assert_eq!(policy.delay_for_retry(4), Duration::ZERO);
    }

    async fn run_counting(
        policy: &RetryPolicy,
        action: RetryAction,
        succeed_on: Option<u32>,
    ) -> (Result<u32, String>, u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(
            policy,
            "test",
            |_| action,
            || {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                    match succeed_on {
                        Some(k) if n >= k => Ok(n),
                        _ => Err(format!("failure {n}")),
                    }
                }
            },
        )
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let (result, calls) =
            run_counting(&RetryPolicy::immediate(3), RetryAction::Retry, Some(1)).await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let (result, calls) =
            run_counting(&RetryPolicy::immediate(3), RetryAction::Retry, Some(3)).await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_at_ceiling() {
        let (result, calls) =
            run_counting(&RetryPolicy::immediate(3), RetryAction::Retry, None).await;
        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let (result, calls) =
            run_counting(&RetryPolicy::immediate(5), RetryAction::Abort, None).await;
        assert_eq!(result, Err("failure 1".to_string()));
        assert_eq!(calls, 1);
    }
}
