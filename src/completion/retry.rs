//! Bounded retry for completion requests

use std::time::Duration;

use super::{CompletionBackend, collect_reply};
use crate::transcript::Turn;
use crate::{Error, Result};

/// Retry policy for completion requests
///
/// An attempt is one full request: opening the stream and reading it to the
/// end. Only connection failures are retried; a fixed delay separates
/// attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with no pause between attempts
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Determine whether an HTTP status from the completion service is transient.
///
/// Rate limits (429) and server errors (5xx) are treated like a dropped
/// connection; everything else is a hard rejection.
#[must_use]
pub fn is_recoverable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Request a full reply, retrying connection failures
///
/// `on_failure` is called after every failed connection attempt with the
/// error, the 1-based attempt number and the attempt limit.
///
/// # Errors
///
/// Returns [`Error::Connection`] once every attempt has failed to connect, or
/// the first non-connection error unchanged
pub async fn complete_with_retry<F>(
    backend: &dyn CompletionBackend,
    turns: &[Turn],
    policy: &RetryPolicy,
    mut on_failure: F,
) -> Result<String>
where
    F: FnMut(&Error, u32, u32) + Send,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let result = match backend.open_stream(turns).await {
            Ok(stream) => collect_reply(stream).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                tracing::debug!(backend = backend.name(), attempt, "completion succeeded");
                return Ok(reply);
            }
            Err(e) if e.is_connection() => {
                tracing::warn!(
                    backend = backend.name(),
                    attempt,
                    max_attempts,
                    error = %e,
                    "completion attempt failed"
                );
                on_failure(&e, attempt, max_attempts);
                last_error = Some(e);

                if attempt < max_attempts && !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    let reason = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
    Err(Error::Connection(format!(
        "giving up after {max_attempts} attempts: {reason}"
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;
    use crate::completion::FragmentStream;
    use crate::transcript::Transcript;

    /// Fails the first `failures` calls, then streams `reply <call number>`
    struct Flaky {
        failures: u32,
        error: fn() -> Error,
        mid_stream: bool,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                error: || Error::Connection("connection refused".to_string()),
                mid_stream: false,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn open_stream(&self, _turns: &[Turn]) -> Result<FragmentStream> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let items: Vec<Result<String>> = if call > self.failures {
                vec![Ok(format!("reply {call}"))]
            } else if self.mid_stream {
                vec![Ok("partial".to_string()), Err((self.error)())]
            } else {
                return Err((self.error)());
            };
            Ok(futures::stream::iter(items).boxed())
        }
    }

    fn turns() -> Vec<Turn> {
        let mut transcript = Transcript::new("sys");
        transcript.push_user("hello");
        transcript.turns().to_vec()
    }

    // -- is_recoverable_status ----------------------------------------------

    #[test]
    fn recoverable_on_rate_limit_and_server_errors() {
        assert!(is_recoverable_status(429));
        assert!(is_recoverable_status(500));
        assert!(is_recoverable_status(503));
        assert!(is_recoverable_status(599));
    }

    #[test]
    fn not_recoverable_on_client_errors() {
        assert!(!is_recoverable_status(400));
        assert!(!is_recoverable_status(401));
        assert!(!is_recoverable_status(404));
        assert!(!is_recoverable_status(200));
    }

    // -- complete_with_retry ------------------------------------------------

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let backend = Flaky::new(2);
        let mut seen = Vec::new();

        let reply = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(3), |_, n, max| {
            seen.push((n, max));
        })
        .await
        .unwrap();

        assert_eq!(reply, "reply 3");
        assert_eq!(backend.calls(), 3);
        assert_eq!(seen, vec![(1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let backend = Flaky::new(u32::MAX);
        let mut failures = 0;

        let err = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(3), |_, _, _| {
            failures += 1;
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(backend.calls(), 3);
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn does_not_retry_rejections() {
        let backend = Flaky {
            error: || Error::Completion("401 unauthorized".to_string()),
            ..Flaky::new(1)
        };

        let err = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(3), |_, _, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Completion(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let backend = Flaky::new(0);
        let reply = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(0), |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(reply, "reply 1");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn mid_stream_drop_restarts_reply() {
        let backend = Flaky {
            mid_stream: true,
            ..Flaky::new(1)
        };
        let mut failures = 0;

        let reply = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(3), |e, _, _| {
            assert!(e.is_connection());
            failures += 1;
        })
        .await
        .unwrap();

        assert_eq!(reply, "reply 2");
        assert_eq!(backend.calls(), 2);
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn mid_stream_rejection_is_not_retried() {
        let backend = Flaky {
            error: || Error::Completion("malformed chunk".to_string()),
            mid_stream: true,
            ..Flaky::new(1)
        };

        let err = complete_with_retry(&backend, &turns(), &RetryPolicy::immediate(3), |_, _, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Completion(_)));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn default_policy_sleeps_between_attempts() {
        let backend = Flaky::new(u32::MAX);
        let started = tokio::time::Instant::now();

        let err = complete_with_retry(&backend, &turns(), &RetryPolicy::default(), |_, _, _| {})
            .await
            .unwrap_err();

        // Two pauses of 2 s, none after the final attempt
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(backend.calls(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_one_failure_waits_once() {
        let backend = Flaky::new(1);
        let started = tokio::time::Instant::now();

        let reply = complete_with_retry(&backend, &turns(), &RetryPolicy::default(), |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(reply, "reply 2");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }
}
