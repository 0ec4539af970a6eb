//! One-shot, multi-subscriber lifecycle signals.

pub mod state;
pub mod task;
pub mod types;

pub use types::{EndTask, FullTask, State, TaskError, TaskResult};
