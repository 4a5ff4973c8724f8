//! Blocking HTTP GET with retry, exponential backoff, and circuit breaker.
//!
//! Shared by the Yahoo and FRED providers. Status handling:
//! - 403 trips the breaker immediately
//! - 404 means the identifier does not exist
//! - 429 and other non-success codes count as failures and are retried
//! - connect/timeout errors are retried, anything else fails at once

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::debug;

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;

/// Retry and timeout settings for one provider.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// HTTP client bound to a circuit breaker and retry policy.
pub(crate) struct HttpFetcher {
    client: Client,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub(crate) fn new(breaker: Arc<CircuitBreaker>, policy: RetryPolicy) -> Result<Self, DataError> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Client(e.to_string()))?;

        Ok(Self {
            client,
            breaker,
            policy,
        })
    }

    pub(crate) fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// GET `url`, returning the first successful response.
    pub(crate) fn get(&self, identifier: &str, url: &str) -> Result<Response, DataError> {
        if !self.breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = self.policy.backoff(attempt);
                debug!(identifier, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN {
                        self.breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(DataError::SeriesNotFound {
                            identifier: identifier.to_string(),
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        self.breaker.record_failure();
                        last_error = Some(DataError::Other(format!(
                            "HTTP {status} for {identifier}"
                        )));
                        continue;
                    }

                    self.breaker.record_success();
                    return Ok(resp);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_saturates_for_large_attempts() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            ..RetryPolicy::default()
        };
        let expected = Duration::from_millis(500).saturating_mul(u32::MAX);
        assert_eq!(policy.backoff(40), expected);

        let slow = RetryPolicy {
            base_delay: Duration::MAX,
            ..RetryPolicy::default()
        };
        assert_eq!(slow.backoff(5), Duration::MAX);
    }
}
