//! Retry policy for catalog network sources.
//!
//! Rate limiting (HTTP 429) and other transient failures get separate
//! budgets and backoff shapes. Permission errors and malformed responses are
//! returned immediately so the fetcher can move on to the next source.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Backoff budgets applied to each network source independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after an HTTP 429.
    pub rate_limit_retries: u32,
    /// Linear backoff unit for 429s: the n-th retry (0-based) waits `(n + 1) * unit`.
    pub rate_limit_backoff: Duration,
    /// Retries allowed after a network error or 5xx.
    pub transient_retries: u32,
    /// Flat wait before each transient retry.
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_retries: 3,
            rate_limit_backoff: Duration::from_secs(2),
            transient_retries: 2,
            transient_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same budgets as the default policy, without any waiting.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            rate_limit_backoff: Duration::ZERO,
            transient_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before retrying after `err` on the given 0-based `attempt`, or
    /// `None` when the error is final.
    fn delay_for(&self, err: &FetchError, attempt: u32) -> Option<Duration> {
        match classify(err) {
            RetryClass::RateLimited if attempt < self.rate_limit_retries => {
                Some(self.rate_limit_backoff.saturating_mul(attempt + 1))
            }
            RetryClass::Transient if attempt < self.transient_retries => {
                Some(self.transient_backoff)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryClass {
    RateLimited,
    Transient,
    Fatal,
}

/// Sorts errors into retry classes.
///
/// - [`FetchError::RateLimited`] backs off linearly.
/// - [`FetchError::Http`] (connection reset, timeout) and 5xx
///   [`FetchError::UnexpectedStatus`] retry on a flat delay.
/// - [`FetchError::Forbidden`], other 4xx, [`FetchError::Deserialize`] and
///   [`FetchError::InvalidUrl`] are final.
fn classify(err: &FetchError) -> RetryClass {
    match err {
        FetchError::RateLimited { .. } => RetryClass::RateLimited,
        FetchError::Http(_) => RetryClass::Transient,
        FetchError::UnexpectedStatus { status, .. } if *status >= 500 => RetryClass::Transient,
        FetchError::UnexpectedStatus { .. }
        | FetchError::Forbidden { .. }
        | FetchError::Deserialize { .. }
        | FetchError::InvalidUrl { .. } => RetryClass::Fatal,
    }
}

/// Runs `operation` until it succeeds or `policy` says to stop, returning
/// the last error in the latter case.
pub(crate) async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    source: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(delay) = policy.delay_for(&err, attempt) else {
            return Err(err);
        };

        tracing::warn!(
            source,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "catalog request failed; retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
