use super::backend::DetectionBackend;
use super::types::{PhotoPayload, RawDetectionResponse};
use crate::config::Settings;
use crate::error::AppError;
use async_trait::async_trait;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// How hard to try a backend before giving up on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Limit for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first, on transient failures only.
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.request_timeout(),
            max_retries: settings.max_retries,
            initial_backoff: settings.retry_backoff(),
        }
    }

    /// Exponential backoff with up to 50% random jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.saturating_mul(2u32.saturating_pow(retry));
        let jitter_ms = (base.as_millis() / 2) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
    }
}

/// Wraps a backend with a per-attempt timeout and bounded retries.
///
/// Only [`AppError::is_transient`] failures are retried. Upstream, parse and
/// configuration errors are returned on the first occurrence.
pub struct ResilientBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B> ResilientBackend<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self {
            inner: backend,
            policy,
        }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[async_trait]
impl<B> DetectionBackend for ResilientBackend<B>
where
    B: DetectionBackend,
{
    #[instrument(skip(self, photo), fields(backend = self.inner.name()))]
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
        let mut retry = 0;
        loop {
            let start = Instant::now();
            let result = match tokio::time::timeout(self.policy.timeout, self.inner.detect(photo)).await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(response) => {
                    debug!(
                        "Attempt {} succeeded in {}ms",
                        retry + 1,
                        start.elapsed().as_millis()
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && retry < self.policy.max_retries => {
                    let delay = self.policy.backoff(retry);
                    warn!(
                        "Attempt {} failed ({}), retrying in {}ms",
                        retry + 1,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Extension trait to wrap any backend with retries.
pub trait BackendResilience: Sized {
    fn resilient(self, policy: RetryPolicy) -> ResilientBackend<Self>;
}

impl<B> BackendResilience for B
where
    B: DetectionBackend,
{
    fn resilient(self, policy: RetryPolicy) -> ResilientBackend<Self> {
        ResilientBackend::new(self, policy)
    }
}
