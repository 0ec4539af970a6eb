use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Lifecycle of an observable task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Started,
    Succeeded,
    Failed,
    /// The owner gave up on the task before it ended.
    Abandoned,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Succeeded | State::Failed | State::Abandoned)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),
    #[error("task was abandoned before it ended")]
    Abandoned,
}

pub type TaskResult<T, E> = Result<T, TaskError<E>>;

#[derive(Debug, Clone)]
pub(crate) enum Slot<T, E> {
    Pending,
    Started,
    Succeeded { value: T, started: bool },
    Failed { err: E, started: bool },
    Abandoned { started: bool },
}

/// Shared completion cell behind both task shapes.
pub(crate) struct Signal<T, E> {
    pub(crate) tx: watch::Sender<Slot<T, E>>,
}

/// Terminal-only task: a single ended phase carrying success or failure.
pub struct EndTask<T, E> {
    pub(crate) signal: Arc<Signal<T, E>>,
}

/// Two-phase task: started, then ended.
pub struct FullTask<T, E> {
    pub(crate) signal: Arc<Signal<T, E>>,
}
