pub mod poller;
pub mod types;

pub use types::{DEFAULT_POLL_INTERVAL, PollError, PollResult, ReadinessPoller, Ready};
