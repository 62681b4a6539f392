use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use uuid::Uuid;

use crate::RowsetError;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Load,
    Export,
    Mutation,
    ForeignKeys,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Load => "Load",
            TaskKind::Export => "Export",
            TaskKind::Mutation => "Mutation",
            TaskKind::ForeignKeys => "Foreign Keys",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `Err(Cancelled)` once the token is set, for use with `?` in loops.
    pub fn check(&self) -> Result<(), RowsetError> {
        if self.is_cancelled() {
            Err(RowsetError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
    cancel_token: CancelToken,
    finished_seq: u64,
}

impl Task {
    pub fn elapsed(&self) -> std::time::Duration {
        match self.completed_at {
            Some(completed) => completed.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel_token
    }
}

#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    pub status: TaskStatus,
    pub elapsed_secs: f64,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            kind: task.kind,
            description: task.description.clone(),
            status: task.status.clone(),
            elapsed_secs: task.elapsed().as_secs_f64(),
        }
    }
}

/// Finished tasks kept for status lookups before the oldest are evicted.
pub const FINISHED_TASK_LIMIT: usize = 64;

/// Registry of background tasks and their status.
///
/// Running tasks are always kept; at most [`FINISHED_TASK_LIMIT`] finished
/// ones are retained, oldest evicted first.
#[derive(Default)]
pub struct TaskManager {
    tasks: HashMap<TaskId, Task>,
    finished: u64,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        kind: TaskKind,
        description: impl Into<String>,
    ) -> (TaskId, CancelToken) {
        let id = TaskId::new_v4();
        let cancel_token = CancelToken::new();

        let task = Task {
            id,
            kind,
            description: description.into(),
            status: TaskStatus::Running,
            started_at: Instant::now(),
            completed_at: None,
            cancel_token: cancel_token.clone(),
            finished_seq: 0,
        };

        self.tasks.insert(id, task);
        (id, cancel_token)
    }

    pub fn complete(&mut self, id: TaskId) {
        self.finish(id, TaskStatus::Completed);
    }

    pub fn fail(&mut self, id: TaskId, error: impl Into<String>) {
        self.finish(id, TaskStatus::Failed(error.into()));
    }

    pub fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(task) = self.tasks.get(&id)
            && task.status == TaskStatus::Running
        {
            task.cancel_token.cancel();
            self.finish(id, TaskStatus::Cancelled);
            return true;
        }
        false
    }

    fn finish(&mut self, id: TaskId, status: TaskStatus) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.status != TaskStatus::Running {
            return;
        }

        self.finished += 1;
        task.status = status;
        task.completed_at = Some(Instant::now());
        task.finished_seq = self.finished;

        self.evict_finished();
    }

    fn evict_finished(&mut self) {
        let mut finished: Vec<(u64, TaskId)> = self
            .tasks
            .values()
            .filter(|task| task.status.is_terminal())
            .map(|task| (task.finished_seq, task.id))
            .collect();

        if finished.len() <= FINISHED_TASK_LIMIT {
            return;
        }

        finished.sort_unstable_by_key(|(seq, _)| *seq);
        let excess = finished.len() - FINISHED_TASK_LIMIT;
        for (_, id) in finished.into_iter().take(excess) {
            self.tasks.remove(&id);
        }
    }

    pub fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.get(&id).map(TaskSnapshot::from)
    }

    pub fn has_running_tasks(&self) -> bool {
        self.tasks.values().any(|t| t.status == TaskStatus::Running)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn lock_manager(manager: &Mutex<TaskManager>) -> MutexGuard<'_, TaskManager> {
    manager.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How a background task ended.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(RowsetError),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn into_result(self) -> Result<T, RowsetError> {
        match self {
            TaskOutcome::Completed(value) => Ok(value),
            TaskOutcome::Failed(e) => Err(e),
            TaskOutcome::Cancelled => Err(RowsetError::Cancelled),
        }
    }
}

type SuccessCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailureCallback = Box<dyn FnOnce(&RowsetError) + Send>;

/// Completion callbacks, run on the worker thread.
///
/// Exactly one runs for a completed or failed task. A cancelled task runs
/// neither.
pub struct TaskCallbacks<T> {
    on_success: Option<SuccessCallback<T>>,
    on_failure: Option<FailureCallback>,
}

impl<T> TaskCallbacks<T> {
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&RowsetError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl<T> Default for TaskCallbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller's view of a spawned task.
pub struct TaskHandle<T> {
    id: TaskId,
    token: CancelToken,
    manager: Arc<Mutex<TaskManager>>,
    receiver: Receiver<TaskOutcome<T>>,
    outcome: Option<TaskOutcome<T>>,
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        log::info!("[CANCEL] Cancelling task {}", self.id);
        self.token.cancel();
        lock_manager(&self.manager).cancel(self.id);
    }

    /// Block until the task ends.
    pub fn wait(mut self) -> TaskOutcome<T> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }

        self.receiver.recv().unwrap_or_else(|_| {
            TaskOutcome::Failed(RowsetError::ExecutionFailure(
                "Worker terminated without reporting".to_string(),
            ))
        })
    }

    /// Outcome if the task has already ended.
    pub fn try_outcome(&mut self) -> Option<&TaskOutcome<T>> {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.outcome = Some(TaskOutcome::Failed(RowsetError::ExecutionFailure(
                        "Worker terminated without reporting".to_string(),
                    )));
                }
            }
        }

        self.outcome.as_ref()
    }
}

/// Runs units of work on worker threads and tracks them in a [`TaskManager`].
#[derive(Clone, Default)]
pub struct TaskRunner {
    manager: Arc<Mutex<TaskManager>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: TaskId) -> Option<TaskSnapshot> {
        lock_manager(&self.manager).get(id)
    }

    pub fn has_running_tasks(&self) -> bool {
        lock_manager(&self.manager).has_running_tasks()
    }

    /// Number of tracked tasks, running or retained after finishing.
    pub fn tracked_tasks(&self) -> usize {
        lock_manager(&self.manager).len()
    }

    pub fn spawn<T, F>(
        &self,
        kind: TaskKind,
        description: impl Into<String>,
        work: F,
        callbacks: TaskCallbacks<T>,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, RowsetError> + Send + 'static,
    {
        let (handle, _worker) = self.spawn_after(None, kind, description.into(), work, callbacks);
        handle
    }

    /// Spawn a worker that first waits for `prior` to exit.
    fn spawn_after<T, F>(
        &self,
        prior: Option<JoinHandle<()>>,
        kind: TaskKind,
        description: String,
        work: F,
        callbacks: TaskCallbacks<T>,
    ) -> (TaskHandle<T>, JoinHandle<()>)
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, RowsetError> + Send + 'static,
    {
        let (id, token) = lock_manager(&self.manager).start(kind, description.clone());
        let (sender, receiver) = mpsc::channel();

        log::info!("[TASK] Started {} task {}: {}", kind.label(), id, description);

        let manager = self.manager.clone();
        let worker_token = token.clone();

        let worker = thread::spawn(move || {
            if let Some(prior) = prior
                && prior.join().is_err()
            {
                log::warn!("[TASK] Previous worker panicked");
            }

            let result = if worker_token.is_cancelled() {
                Err(RowsetError::Cancelled)
            } else {
                work(&worker_token)
            };

            let outcome = match result {
                _ if worker_token.is_cancelled() => TaskOutcome::Cancelled,
                Ok(value) => TaskOutcome::Completed(value),
                Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
                Err(e) => TaskOutcome::Failed(e),
            };

            {
                let mut manager = lock_manager(&manager);
                match &outcome {
                    TaskOutcome::Completed(_) => manager.complete(id),
                    TaskOutcome::Failed(e) => manager.fail(id, e.to_string()),
                    TaskOutcome::Cancelled => {
                        manager.cancel(id);
                    }
                }
            }

            match &outcome {
                TaskOutcome::Completed(value) => {
                    log::info!("[TASK] {} task {} completed", kind.label(), id);
                    if let Some(f) = callbacks.on_success {
                        f(value);
                    }
                }
                TaskOutcome::Failed(e) => {
                    log::error!("[TASK] {} task {} failed: {}", kind.label(), id, e);
                    if let Some(f) = callbacks.on_failure {
                        f(e);
                    }
                }
                TaskOutcome::Cancelled => {
                    log::info!("[TASK] {} task {} cancelled", kind.label(), id);
                }
            }

            // The handle may already be dropped.
            let _ = sender.send(outcome);
        });

        let handle = TaskHandle {
            id,
            token,
            manager: self.manager.clone(),
            receiver,
            outcome: None,
        };

        (handle, worker)
    }
}

struct SlotEntry {
    id: TaskId,
    token: CancelToken,
    worker: JoinHandle<()>,
}

/// Holds at most one running task; starting another cancels the previous
/// one and waits for its worker to exit before the new work runs.
pub struct TaskSlot {
    runner: TaskRunner,
    current: Mutex<Option<SlotEntry>>,
}

impl TaskSlot {
    pub fn new(runner: TaskRunner) -> Self {
        Self {
            runner,
            current: Mutex::new(None),
        }
    }

    pub fn spawn_exclusive<T, F>(
        &self,
        kind: TaskKind,
        description: impl Into<String>,
        work: F,
        callbacks: TaskCallbacks<T>,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, RowsetError> + Send + 'static,
    {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let prior = current.take().map(|entry| {
            if !entry.worker.is_finished() {
                log::info!("[CANCEL] Interrupting task {}", entry.id);
            }
            entry.token.cancel();
            lock_manager(&self.runner.manager).cancel(entry.id);
            entry.worker
        });

        let (handle, worker) =
            self.runner
                .spawn_after(prior, kind, description.into(), work, callbacks);

        *current = Some(SlotEntry {
            id: handle.id(),
            token: handle.cancel_token().clone(),
            worker,
        });

        handle
    }

    /// Cancel the slot's task if it is still running.
    pub fn cancel(&self) -> bool {
        let current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match current.as_ref() {
            Some(entry) if !entry.worker.is_finished() => {
                entry.token.cancel();
                lock_manager(&self.runner.manager).cancel(entry.id);
                true
            }
            _ => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_some_and(|entry| !entry.worker.is_finished())
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }
}
