//! Bounded polling for asynchronous server-side jobs.
//!
//! Retrieval and deployment both hand back a job id whose status must be
//! checked until a terminal state appears. The loop here makes that wait
//! explicit and bounded: status checks back off exponentially up to a cap,
//! and the whole wait fails deterministically once the overall timeout
//! elapses.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Timing bounds for one job wait.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay before the second status check.
    pub initial_interval: Duration,
    /// Cap for the backed-off check interval.
    pub max_interval: Duration,
    /// Overall bound on the wait.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            timeout: Duration::from_secs(120),
        }
    }
}

/// One observed job status.
#[derive(Debug)]
pub enum Polled<T> {
    /// Queued or running; keep waiting.
    Pending,
    /// Terminal success.
    Complete(T),
    /// Terminal failure with the server-supplied reason.
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PollError<E: std::error::Error> {
    #[error("job did not reach a terminal state within {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Api(E),
}

/// Poll `check` until it reports a terminal state, or fail with
/// [`PollError::TimedOut`] once `config.timeout` has elapsed.
pub async fn poll_until_complete<T, E, F, Fut>(
    config: &PollConfig,
    mut check: F,
) -> Result<T, PollError<E>>
where
    E: std::error::Error,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Polled<T>, E>>,
{
    let started = Instant::now();
    let mut interval = config.initial_interval;

    loop {
        match check().await.map_err(PollError::Api)? {
            Polled::Complete(value) => return Ok(value),
            Polled::Failed(reason) => return Err(PollError::Failed(reason)),
            Polled::Pending => {}
        }

        let elapsed = started.elapsed();
        if elapsed >= config.timeout {
            return Err(PollError::TimedOut(config.timeout));
        }

        let remaining = config.timeout - elapsed;
        let delay = interval.min(remaining);
        debug!("job still pending, next status check in {:?}", delay);
        sleep(delay).await;
        interval = (interval * 2).min(config.max_interval);
    }
}
