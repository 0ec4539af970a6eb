use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::types::{DEFAULT_POLL_INTERVAL, PollError, PollResult, ReadinessPoller, Ready};

impl ReadinessPoller {
    pub fn new(interval: Duration) -> Self {
        ReadinessPoller {
            interval,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Calls `probe` right away and then every `interval` until `ready` accepts
    /// a snapshot. Probe failures count as "not ready yet" and are never
    /// returned to the caller.
    pub async fn poll<S, E, F, Fut, P>(&self, mut probe: F, ready: P) -> PollResult<S>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        E: Display,
        P: Fn(&S) -> bool,
    {
        let started = Instant::now();
        let deadline = self.deadline.map(|limit| (started + limit, limit));
        let mut attempts = 0u64;

        loop {
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled { attempts }),
                _ = expire(deadline) => return Err(exceeded(deadline, attempts)),
                outcome = probe() => outcome,
            };

            match outcome {
                Ok(snapshot) if ready(&snapshot) => {
                    return Ok(Ready {
                        snapshot,
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(_) => trace!(attempts, "probe answered, not ready"),
                Err(err) => debug!(attempts, error = %err, "probe failed"),
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled { attempts }),
                _ = expire(deadline) => return Err(exceeded(deadline, attempts)),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

async fn expire(deadline: Option<(Instant, Duration)>) {
    match deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn exceeded(deadline: Option<(Instant, Duration)>, attempts: u64) -> PollError {
    PollError::DeadlineExceeded {
        attempts,
        deadline: deadline.map(|(_, limit)| limit).unwrap_or_default(),
    }
}
