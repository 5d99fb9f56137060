//! Retrying provider wrapper
//!
//! Wraps any [`LLMProvider`] and repeats a call when the failure is transient
//! (see [`GatewayError::is_retryable`]). The orchestration loop never retries
//! on its own; recovery lives entirely in this layer.

use super::{GatewayError, LLMProvider, OracleReply, Turn};
use async_trait::async_trait;
use sdk::ToolDescriptor;
use std::sync::Arc;
use std::time::Duration;

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry; attempt `n` waits `n * backoff`
    pub backoff: Duration,

    /// Upper bound on a single attempt. An attempt that runs longer fails
    /// with [`GatewayError::Timeout`] and is retried like any other
    /// transient failure.
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            attempt_timeout: None,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Bound every attempt by `attempt_timeout`
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    /// Worst-case wall time of a call under this policy
    ///
    /// `None` when attempts are unbounded.
    pub fn total_budget(&self) -> Option<Duration> {
        let per_attempt = self.attempt_timeout?;
        let waits = (1..self.max_attempts)
            .fold(Duration::ZERO, |acc, attempt| acc.saturating_add(self.delay_for(attempt)));
        Some(per_attempt.saturating_mul(self.max_attempts).saturating_add(waits))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Provider decorator that retries transient gateway failures
pub struct RetryingProvider {
    inner: Arc<dyn LLMProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(
        &self,
        messages: &[Turn],
        tools: &[ToolDescriptor],
    ) -> super::Result<OracleReply> {
        let Some(limit) = self.policy.attempt_timeout else {
            return self.inner.generate(messages, tools).await;
        };

        match tokio::time::timeout(limit, self.inner.generate(messages, tools)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Provider {} did not answer within {}ms",
                    self.inner.name(),
                    limit.as_millis()
                );
                Err(GatewayError::Timeout)
            }
        }
    }
}

#[async_trait]
impl LLMProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn check_health(&self) -> bool {
        self.inner.check_health().await
    }

    async fn generate(
        &self,
        messages: &[Turn],
        tools: &[ToolDescriptor],
    ) -> super::Result<OracleReply> {
        let mut attempt = 1;
        loop {
            match self.attempt(messages, tools).await {
                Ok(reply) => {
                    if attempt > 1 {
                        tracing::info!(
                            "Provider {} succeeded on attempt {}",
                            self.inner.name(),
                            attempt
                        );
                    }
                    return Ok(reply);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "Provider {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        self.inner.name(),
                        attempt,
                        self.policy.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            "Provider {} exhausted {} attempts",
                            self.inner.name(),
                            self.policy.max_attempts
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error until `failures` calls have been made
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> GatewayError,
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(
            &self,
            _messages: &[Turn],
            _tools: &[ToolDescriptor],
        ) -> super::super::Result<OracleReply> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(OracleReply::text("ok"))
            }
        }
    }

    fn flaky(failures: u32, error: fn() -> GatewayError) -> Arc<FlakyProvider> {
        Arc::new(FlakyProvider {
            failures,
            calls: AtomicU32::new(0),
            error,
        })
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let inner = flaky(2, || GatewayError::Timeout);
        let provider = RetryingProvider::new(inner.clone(), RetryPolicy::new(3, Duration::ZERO));

        let reply = provider.generate(&[Turn::user("hi")], &[]).await.unwrap();
        assert_eq!(reply.content.as_deref(), Some("ok"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = flaky(10, || GatewayError::RateLimitExceeded);
        let provider = RetryingProvider::new(inner.clone(), RetryPolicy::new(2, Duration::ZERO));

        let err = provider.generate(&[], &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimitExceeded));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_auth_failures() {
        let inner = flaky(10, || GatewayError::AuthenticationFailed("401".into()));
        let provider = RetryingProvider::new(inner.clone(), RetryPolicy::new(5, Duration::ZERO));

        assert!(provider.generate(&[], &[]).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    /// Hangs on its first call, answers afterwards
    struct HangsOnce {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LLMProvider for HangsOnce {
        fn name(&self) -> &str {
            "hangs-once"
        }

        async fn generate(
            &self,
            _messages: &[Turn],
            _tools: &[ToolDescriptor],
        ) -> super::super::Result<OracleReply> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(OracleReply::text("ok"))
        }
    }

    #[tokio::test]
    async fn test_hanging_attempt_is_retried() {
        let inner = Arc::new(HangsOnce {
            calls: AtomicU32::new(0),
        });
        let policy =
            RetryPolicy::new(3, Duration::ZERO).with_attempt_timeout(Duration::from_millis(50));
        let provider = RetryingProvider::new(inner.clone(), policy);

        let reply = provider.generate(&[Turn::user("hi")], &[]).await.unwrap();
        assert_eq!(reply.content.as_deref(), Some("ok"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_every_attempt_timing_out_is_timeout() {
        let inner = Arc::new(HangsOnce {
            calls: AtomicU32::new(0),
        });
        let policy =
            RetryPolicy::new(1, Duration::ZERO).with_attempt_timeout(Duration::from_millis(20));
        let provider = RetryingProvider::new(inner.clone(), policy);

        let err = provider.generate(&[], &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_total_budget_covers_attempts_and_waits() {
        assert_eq!(RetryPolicy::new(3, Duration::from_millis(100)).total_budget(), None);

        let policy = RetryPolicy::new(3, Duration::from_millis(100))
            .with_attempt_timeout(Duration::from_secs(1));
        // 3 attempts of 1s plus waits of 100ms and 200ms
        assert_eq!(policy.total_budget(), Some(Duration::from_millis(3300)));
    }

    #[test]
    fn test_policy_never_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
