//! Thread-safe set of active load tasks.

use super::handle::LoadTask;
use super::id::TaskId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The orchestrator's set of live tasks.
///
/// Every operation takes a single short critical section; nothing is ever
/// awaited or called back while the lock is held.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, LoadTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: LoadTask) {
        self.tasks.lock().insert(task.id(), task);
    }

    /// Removes the task. Removing an absent id is a no-op.
    pub fn remove(&self, id: TaskId) -> Option<LoadTask> {
        self.tasks.lock().remove(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Copies the current tasks out so callers can act on them unlocked.
    pub fn snapshot(&self) -> Vec<LoadTask> {
        self.tasks.lock().values().cloned().collect()
    }

    /// Inserts `task` and returns a guard that removes it when dropped.
    pub(crate) fn register(self: &Arc<Self>, task: &LoadTask) -> Registration {
        self.insert(task.clone());
        Registration {
            registry: Arc::clone(self),
            id: task.id(),
        }
    }
}

/// Keeps a task registered for as long as it is alive.
#[derive(Debug)]
pub(crate) struct Registration {
    registry: Arc<TaskRegistry>,
    id: TaskId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
