//! Retrying HTTP send.
//!
//! Transient transport failures and retriable status codes are retried on an
//! exponential backoff schedule with jitter. Anything else is returned to the
//! caller for status mapping.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::debug;

/// Retry schedule for a single logical request.
#[derive(Debug, Clone, Copy)]
pub(super) struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for `attempt` (0-based), with up to 25% jitter added.
    fn delay_for(&self, attempt: usize) -> Duration {
        let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
        let base = Duration::from_millis(
            (self.base_delay.as_millis() as u64).saturating_mul(multiplier),
        );

        let max_jitter_ms = (base.as_millis() / 4) as u64;
        if max_jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter_ms))
    }
}

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

/// Send a request built by `make_request`, retrying per `policy`.
///
/// Returns the final response even when its status is not a success; the
/// caller owns the status-to-error mapping.
pub(super) async fn send_with_retry(
    policy: RetryPolicy,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response, reqwest::Error> {
    let max_attempts = policy.max_retries + 1;

    for attempt in 0..max_attempts {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success()
                    || !is_retriable_status(status)
                    || attempt + 1 == max_attempts
                {
                    return Ok(response);
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    "request failed with status {}; retrying in {:?} (attempt {}/{})",
                    status,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                // Drain the body so the connection can be reused.
                let _ = response.bytes().await;
                sleep(delay).await;
            }
            Err(err) => {
                if !is_retriable_send_error(&err) || attempt + 1 == max_attempts {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    "request error: {}; retrying in {:?} (attempt {}/{})",
                    err,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                sleep(delay).await;
            }
        }
    }

    unreachable!("send_with_retry returns within max_attempts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempts() {
        let policy = RetryPolicy::default();
        let first = policy.delay_for(0);
        let third = policy.delay_for(2);
        assert!(first >= Duration::from_secs(1));
        assert!(third >= Duration::from_secs(4));
    }

    #[test]
    fn retriable_statuses() {
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retriable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retriable_status(StatusCode::NOT_FOUND));
    }
}
