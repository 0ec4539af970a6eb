use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use super::state::valid_state_transition;
use super::types::{EndTask, FullTask, Signal, Slot, State, TaskError, TaskResult};

impl<T, E> Slot<T, E> {
    fn state(&self) -> State {
        match self {
            Slot::Pending => State::Pending,
            Slot::Started => State::Started,
            Slot::Succeeded { .. } => State::Succeeded,
            Slot::Failed { .. } => State::Failed,
            Slot::Abandoned { .. } => State::Abandoned,
        }
    }

    fn has_started(&self) -> bool {
        match self {
            Slot::Pending => false,
            Slot::Started => true,
            Slot::Succeeded { started, .. }
            | Slot::Failed { started, .. }
            | Slot::Abandoned { started } => *started,
        }
    }

    /// Records whether the slot being replaced had started.
    fn started_from(&mut self, prev: &Slot<T, E>) {
        match self {
            Slot::Succeeded { started, .. }
            | Slot::Failed { started, .. }
            | Slot::Abandoned { started } => *started = prev.has_started(),
            Slot::Pending | Slot::Started => {}
        }
    }
}

impl<T, E> Slot<T, E>
where
    T: Clone,
    E: Clone,
{
    fn outcome(&self) -> TaskResult<T, E> {
        match self {
            Slot::Succeeded { value, .. } => Ok(value.clone()),
            Slot::Failed { err, .. } => Err(TaskError::Failed(err.clone())),
            _ => Err(TaskError::Abandoned),
        }
    }
}

impl<T, E> Signal<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Slot::Pending);
        Signal { tx }
    }

    fn state(&self) -> State {
        self.tx.borrow().state()
    }

    /// Applies `next` if the transition is legal. Returns whether it was applied.
    fn transition(&self, next: Slot<T, E>) -> bool {
        let mut next = Some(next);
        self.tx.send_if_modified(|slot| {
            let dst = match next.as_ref() {
                Some(dst) => dst.state(),
                None => return false,
            };
            if !valid_state_transition(&slot.state(), &dst) {
                return false;
            }
            match next.take() {
                Some(mut value) => {
                    value.started_from(slot);
                    *slot = value;
                    true
                }
                None => false,
            }
        })
    }

    fn wait_started(&self) -> impl Future<Output = TaskResult<(), E>> + Send + use<T, E> {
        let mut rx = self.tx.subscribe();
        async move {
            match rx.wait_for(|slot| slot.state() != State::Pending).await {
                Ok(slot) if slot.has_started() => Ok(()),
                Ok(slot) => match &*slot {
                    Slot::Failed { err, .. } => Err(TaskError::Failed(err.clone())),
                    _ => Err(TaskError::Abandoned),
                },
                Err(_) => Err(TaskError::Abandoned),
            }
        }
    }

    fn wait_ended(&self) -> impl Future<Output = TaskResult<T, E>> + Send + use<T, E> {
        let mut rx = self.tx.subscribe();
        async move {
            match rx.wait_for(|slot| slot.state().is_terminal()).await {
                Ok(slot) => slot.outcome(),
                // every owner dropped the task without ending it
                Err(_) => Err(TaskError::Abandoned),
            }
        }
    }
}

impl<T, E> EndTask<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        EndTask {
            signal: Arc::new(Signal::new()),
        }
    }

    pub fn state(&self) -> State {
        self.signal.state()
    }

    /// Resolves once the task has ended. Subscribing after the end replays the
    /// recorded outcome.
    pub fn on_end(&self) -> impl Future<Output = TaskResult<T, E>> + Send + use<T, E> {
        self.signal.wait_ended()
    }

    /// Signals the ended phase. Only the first end signal has any effect.
    pub fn end(&self, result: Result<T, E>) -> bool {
        match result {
            Ok(value) => self.signal.transition(Slot::Succeeded {
                value,
                started: false,
            }),
            Err(err) => self.signal.transition(Slot::Failed {
                err,
                started: false,
            }),
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.end(Ok(value))
    }

    pub fn reject(&self, err: E) -> bool {
        self.end(Err(err))
    }

    pub fn abandon(&self) -> bool {
        self.signal.transition(Slot::Abandoned { started: false })
    }
}

impl<T, E> FullTask<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        FullTask {
            signal: Arc::new(Signal::new()),
        }
    }

    pub fn state(&self) -> State {
        self.signal.state()
    }

    /// Signals the started phase, then yields so subscribers that were already
    /// waiting run before the caller moves on.
    pub async fn start(&self) {
        self.signal.transition(Slot::Started);
        tokio::task::yield_now().await;
    }

    /// Resolves once the task has started. A task that ended without ever
    /// starting reports its failure, or `Abandoned` if it succeeded.
    pub fn on_start(&self) -> impl Future<Output = TaskResult<(), E>> + Send + use<T, E> {
        self.signal.wait_started()
    }

    pub fn on_end(&self) -> impl Future<Output = TaskResult<T, E>> + Send + use<T, E> {
        self.signal.wait_ended()
    }

    pub fn end(&self, result: Result<T, E>) -> bool {
        match result {
            Ok(value) => self.signal.transition(Slot::Succeeded {
                value,
                started: false,
            }),
            Err(err) => self.signal.transition(Slot::Failed {
                err,
                started: false,
            }),
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.end(Ok(value))
    }

    pub fn reject(&self, err: E) -> bool {
        self.end(Err(err))
    }

    /// Marks a task that will never end. Has no effect once the task ended.
    pub fn abandon(&self) -> bool {
        self.signal.transition(Slot::Abandoned { started: false })
    }
}

impl<T, E> Clone for EndTask<T, E> {
    fn clone(&self) -> Self {
        EndTask {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl<T, E> Clone for FullTask<T, E> {
    fn clone(&self) -> Self {
        FullTask {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl<T, E> Default for EndTask<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Default for FullTask<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for FullTask<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullTask")
            .field("state", &self.signal.tx.borrow().state())
            .finish()
    }
}

impl<T, E> std::fmt::Debug for EndTask<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndTask")
            .field("state", &self.signal.tx.borrow().state())
            .finish()
    }
}
