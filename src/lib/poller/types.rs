use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Polls a probe at a fixed interval until a readiness predicate holds.
///
/// Without a deadline or a cancelled token the poller never gives up, which
/// is what callers get by default.
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    pub interval: Duration,
    pub deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct Ready<S> {
    pub snapshot: S,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("not ready after {attempts} attempts within {deadline:?}")]
    DeadlineExceeded { attempts: u64, deadline: Duration },
}

pub type PollResult<T> = Result<Ready<T>, PollError>;
