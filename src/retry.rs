//! Retry policy, retry predicates and the retry controller.
//!
//! The controller re-runs one attempt (send + classify) until it succeeds, the
//! failure is not transient, the verb may not be retried, the attempt ceiling
//! is reached or the caller cancels. The last observed error is returned
//! unchanged.

use crate::context::RequestContext;
use crate::{Error, Result};
use http::Method;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Defines how many times and how fast failed calls are retried.
///
/// The delay before the `n`-th retry (0-based) is
/// `min(max_delay, base_delay * multiplier^n)`.
///
/// # Examples
///
/// ```
/// use mgc_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay_for_retry(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_retry(10), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `0` is treated as `1`.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
    /// Retry `POST`, `PATCH` and `DELETE` with the same body.
    ///
    /// Off by default: a mutating call whose response was lost may already
    /// have been applied. Descriptors can opt in individually with
    /// [`RequestDescriptor::idempotent`](crate::RequestDescriptor::idempotent).
    pub retry_mutations: bool,
    /// Wait for the server's `Retry-After` / rate-limit reset hint (capped at
    /// `max_delay`) instead of the backoff formula when one is present.
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
            retry_mutations: false,
            respect_retry_after: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential backoff with the given ceiling and delays.
    pub fn exponential(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_mutations(mut self, retry_mutations: bool) -> Self {
        self.retry_mutations = retry_mutations;
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// The delay before the `retry`-th retry (0-based), before jitter.
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Whether a call with `method` may be retried at all.
    ///
    /// An explicit per-descriptor `idempotent` override wins. Otherwise reads
    /// and `PUT` are retried, and mutating verbs follow `retry_mutations`.
    pub fn allows_retry(&self, method: &Method, idempotent: Option<bool>) -> bool {
        if let Some(idempotent) = idempotent {
            return idempotent;
        }
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT => true,
            _ => self.retry_mutations,
        }
    }

    fn attempt_ceiling(&self) -> usize {
        self.max_attempts.max(1)
    }

    fn next_delay(&self, error: &Error, retry: usize) -> Duration {
        if self.respect_retry_after {
            if let Some(delay) = error.rate_limit_info().and_then(|i| i.delay(self.max_delay)) {
                return delay;
            }
        }

        let delay = self.delay_for_retry(retry);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }
}

/// Decides whether a failed attempt should be retried.
///
/// # Examples
///
/// ```
/// use mgc_core::{Error, RetryPredicate};
///
/// struct OnlyServiceUnavailable;
///
/// impl RetryPredicate for OnlyServiceUnavailable {
///     fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
///         error.status().map(|s| s.as_u16()) == Some(503)
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retries connection failures, timeouts, 5xx and 429.
///
/// This is the default predicate and delegates to [`Error::is_retryable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOnTransient;

impl RetryPredicate for RetryOnTransient {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Book-keeping for one logical call.
#[derive(Debug, Default)]
struct RetryState {
    attempt: usize,
    last_error: Option<Error>,
    next_delay: Option<Duration>,
}

/// Runs attempts of one call under a [`RetryPolicy`].
pub struct RetryController<'a> {
    policy: &'a RetryPolicy,
    predicate: &'a dyn RetryPredicate,
}

impl<'a> RetryController<'a> {
    pub fn new(policy: &'a RetryPolicy, predicate: &'a dyn RetryPredicate) -> Self {
        Self { policy, predicate }
    }

    /// Runs `attempt` until it succeeds or must not be retried.
    ///
    /// `attempt` receives the 1-based attempt number. On success the value is
    /// returned with the number of attempts made. Cancellation is checked
    /// before every attempt and raced against both the attempt itself and the
    /// backoff sleep.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        method: &Method,
        idempotent: Option<bool>,
        mut attempt: F,
    ) -> Result<(T, usize)>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry_allowed = self.policy.allows_retry(method, idempotent);
        let ceiling = self.policy.attempt_ceiling();
        let mut state = RetryState::default();

        loop {
            ctx.check()?;
            state.attempt += 1;

            if let (Some(previous), Some(delay)) = (&state.last_error, state.next_delay) {
                tracing::debug!(
                    attempt = state.attempt,
                    previous_error = %previous,
                    waited_ms = delay.as_millis() as u64,
                    "Starting retry attempt"
                );
            }

            let outcome = tokio::select! {
                biased;
                cancelled = ctx.done() => Err(cancelled),
                result = attempt(state.attempt) => result,
            };

            let error = match outcome {
                Ok(value) => return Ok((value, state.attempt)),
                Err(error) => error,
            };

            tracing::warn!(
                error = %error,
                attempt = state.attempt,
                method = %method,
                "Request attempt failed"
            );

            if error.is_cancelled()
                || !retry_allowed
                || state.attempt >= ceiling
                || !self.predicate.should_retry(&error, state.attempt)
            {
                return Err(error);
            }

            let delay = self.policy.next_delay(&error, state.attempt - 1);
            state.next_delay = Some(delay);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = state.attempt,
                max_attempts = ceiling,
                "Retrying request after delay"
            );

            tokio::select! {
                biased;
                cancelled = ctx.done() => return Err(cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            state.last_error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn status(code: u16) -> Error {
        Error::Status {
            status: StatusCode::from_u16(code).unwrap(),
            message: String::new(),
            raw_response: String::new(),
            headers: HeaderMap::new(),
            rate_limit_info: None,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::exponential(3, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_retry(200), Duration::from_secs(10));
    }

    #[test]
    fn test_custom_multiplier() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(1), Duration::from_secs(60))
            .with_multiplier(3.0);
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(9));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = fast_policy().with_jitter(true);
        for _ in 0..50 {
            let delay = policy.next_delay(&status(500), 1);
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_mutation_policy() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(&Method::GET, None));
        assert!(policy.allows_retry(&Method::PUT, None));
        assert!(!policy.allows_retry(&Method::POST, None));
        assert!(!policy.allows_retry(&Method::PATCH, None));
        assert!(!policy.allows_retry(&Method::DELETE, None));
        assert!(policy.allows_retry(&Method::POST, Some(true)));
        assert!(!policy.allows_retry(&Method::GET, Some(false)));

        let policy = policy.with_retry_mutations(true);
        assert!(policy.allows_retry(&Method::DELETE, None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let policy = fast_policy();
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let calls = &AtomicUsize::new(0);

        let (value, attempts) = controller
            .execute(&RequestContext::new(), &Method::GET, None, move |_| async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status(500))
                } else {
                    Ok("done")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let policy = fast_policy();
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let calls = &AtomicUsize::new(0);

        let err = controller
            .execute(&RequestContext::new(), &Method::GET, None, move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(status(400))
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error_unchanged() {
        let policy = fast_policy();
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let calls = &AtomicUsize::new(0);

        let err = controller
            .execute(&RequestContext::new(), &Method::GET, None, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(status(500 + attempt as u16)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_is_not_retried_by_default() {
        let policy = fast_policy();
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let calls = &AtomicUsize::new(0);

        let result = controller
            .execute(&RequestContext::new(), &Method::POST, None, move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(status(502))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_interrupts_sleep() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(10), Duration::from_secs(10));
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let ctx = RequestContext::new().with_timeout(Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let err = controller
            .execute(&ctx, &Method::GET, None, move |_| async move { Err::<(), _>(status(503)) })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancelled_context_makes_no_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new().with_cancellation(token);
        let policy = fast_policy();
        let controller = RetryController::new(&policy, &RetryOnTransient);
        let calls = &AtomicUsize::new(0);

        let err = controller
            .execute(&ctx, &Method::GET, None, move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        use crate::rate_limit::RateLimitInfo;

        let policy = RetryPolicy::exponential(2, Duration::from_secs(20), Duration::from_secs(60))
            .with_respect_retry_after(true);
        let limited = Error::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: String::new(),
            raw_response: String::new(),
            headers: HeaderMap::new(),
            rate_limit_info: Some(RateLimitInfo {
                retry_after: Some(Duration::from_secs(2)),
                reset_at: None,
                remaining: Some(0),
            }),
        };

        assert_eq!(policy.next_delay(&limited, 0), Duration::from_secs(2));
        assert_eq!(policy.next_delay(&status(429), 0), Duration::from_secs(20));
    }
}
