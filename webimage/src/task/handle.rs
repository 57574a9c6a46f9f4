//! The caller-facing handle on one load request.

use super::id::TaskId;
use super::stage::{Cancelled, Stage};
use crate::ports::FetchHandle;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The side of the orchestrator a task reports back to when cancelled.
///
/// Held weakly so an outstanding handle never keeps the orchestrator alive.
pub(crate) trait TaskOwner: Send + Sync {
    /// Forwards cancellation to the fetch port.
    fn cancel_fetch(&self, handle: FetchHandle);

    /// Drops the task from the active set.
    fn release(&self, id: TaskId);
}

struct TaskInner {
    id: TaskId,
    key: String,
    token: CancellationToken,
    stage: Mutex<Stage>,
    fetch: Mutex<Option<FetchHandle>>,
    owner: Weak<dyn TaskOwner>,
}

/// Handle for an in-flight image load.
///
/// Cloning is cheap and every clone refers to the same request. Dropping all
/// clones does not cancel the request; call [`LoadTask::cancel`] for that.
#[derive(Clone)]
pub struct LoadTask {
    inner: Arc<TaskInner>,
}

impl LoadTask {
    pub(crate) fn new(key: impl Into<String>, owner: Weak<dyn TaskOwner>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                key: key.into(),
                token: CancellationToken::new(),
                stage: Mutex::new(Stage::Lookup),
                fetch: Mutex::new(None),
                owner,
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// The request key as passed by the caller.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn stage(&self) -> Stage {
        *self.inner.stage.lock()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Cancels the request.
    ///
    /// After this returns the completion will not be invoked, any in-flight
    /// fetch has been withdrawn from the fetch port and the task is no longer
    /// counted as active. Cancelling a finished or already-cancelled task has
    /// no effect beyond the flag.
    pub fn cancel(&self) {
        let previous = {
            let mut stage = self.inner.stage.lock();
            self.inner.token.cancel();
            let previous = *stage;
            if !previous.is_terminal() {
                *stage = Stage::Cancelled;
            }
            previous
        };

        let fetch = self.inner.fetch.lock().take();
        if let Some(owner) = self.inner.owner.upgrade() {
            if let Some(handle) = fetch {
                owner.cancel_fetch(handle);
            }
            owner.release(self.inner.id);
        }

        debug!(
            task = %self.inner.id,
            key = %self.inner.key,
            stage = %previous,
            "Load task cancelled"
        );
    }

    /// Resolves once the task has been cancelled.
    pub(crate) async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Moves to `next`, unless the task was cancelled first.
    ///
    /// The check and the transition happen under the stage lock, so a
    /// concurrent [`cancel`](Self::cancel) either lands before (and this
    /// fails) or after (and sees the new stage).
    pub(crate) fn advance(&self, next: Stage) -> Result<(), Cancelled> {
        let mut stage = self.inner.stage.lock();
        if self.inner.token.is_cancelled() {
            return Err(Cancelled);
        }
        *stage = next;
        Ok(())
    }

    /// Records the handle of the in-flight fetch.
    ///
    /// If the task was cancelled while the fetch was being issued, the
    /// handle is forwarded to the fetch port straight away.
    pub(crate) fn attach_fetch(&self, handle: FetchHandle) {
        *self.inner.fetch.lock() = Some(handle);

        if self.inner.token.is_cancelled() {
            if let Some(handle) = self.inner.fetch.lock().take() {
                if let Some(owner) = self.inner.owner.upgrade() {
                    owner.cancel_fetch(handle);
                }
            }
        }
    }

    /// Clears the fetch handle once the fetch has resolved.
    pub(crate) fn detach_fetch(&self) {
        self.inner.fetch.lock().take();
    }

    /// Marks the task as done, unless it was cancelled first.
    pub(crate) fn finish(&self) -> Result<(), Cancelled> {
        self.advance(Stage::Done)
    }
}

impl PartialEq for LoadTask {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for LoadTask {}

impl Hash for LoadTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for LoadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTask")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("stage", &self.stage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOwner {
        cancelled_fetches: Mutex<Vec<FetchHandle>>,
        released: Mutex<Vec<TaskId>>,
    }

    impl TaskOwner for RecordingOwner {
        fn cancel_fetch(&self, handle: FetchHandle) {
            self.cancelled_fetches.lock().push(handle);
        }

        fn release(&self, id: TaskId) {
            self.released.lock().push(id);
        }
    }

    fn task_with_owner() -> (LoadTask, Arc<RecordingOwner>) {
        let owner = Arc::new(RecordingOwner::default());
        let weak: Weak<dyn TaskOwner> = Arc::downgrade(&(owner.clone() as Arc<dyn TaskOwner>));
        (LoadTask::new("img-1", weak), owner)
    }

    // =========================================================================
    // Stage transitions
    // =========================================================================

    #[test]
    fn test_new_task_starts_in_lookup() {
        let (task, _owner) = task_with_owner();
        assert_eq!(task.stage(), Stage::Lookup);
        assert_eq!(task.key(), "img-1");
        assert!(!task.is_cancelled());
    }

    #[test]
    fn test_advance_and_finish() {
        let (task, _owner) = task_with_owner();
        task.advance(Stage::Fetching).unwrap();
        task.advance(Stage::Decoding).unwrap();
        task.finish().unwrap();
        assert_eq!(task.stage(), Stage::Done);
    }

    #[test]
    fn test_advance_after_cancel_fails() {
        let (task, _owner) = task_with_owner();
        task.cancel();
        assert_eq!(task.advance(Stage::Fetching), Err(Cancelled));
        assert_eq!(task.finish(), Err(Cancelled));
        assert_eq!(task.stage(), Stage::Cancelled);
    }

    #[test]
    fn test_cancel_after_done_keeps_done() {
        let (task, _owner) = task_with_owner();
        task.finish().unwrap();
        task.cancel();
        assert!(task.is_cancelled());
        assert_eq!(task.stage(), Stage::Done);
    }

    // =========================================================================
    // Cancellation forwarding
    // =========================================================================

    #[test]
    fn test_cancel_forwards_fetch_and_releases() {
        let (task, owner) = task_with_owner();
        let handle = FetchHandle::next();
        task.attach_fetch(handle);

        task.cancel();

        assert_eq!(*owner.cancelled_fetches.lock(), vec![handle]);
        assert_eq!(*owner.released.lock(), vec![task.id()]);
    }

    #[test]
    fn test_cancel_without_fetch_only_releases() {
        let (task, owner) = task_with_owner();
        task.cancel();
        assert!(owner.cancelled_fetches.lock().is_empty());
        assert_eq!(owner.released.lock().len(), 1);
    }

    #[test]
    fn test_cancel_twice_forwards_fetch_once() {
        let (task, owner) = task_with_owner();
        task.attach_fetch(FetchHandle::next());
        task.cancel();
        task.cancel();
        assert_eq!(owner.cancelled_fetches.lock().len(), 1);
    }

    #[test]
    fn test_attach_after_cancel_forwards_immediately() {
        let (task, owner) = task_with_owner();
        task.cancel();

        let handle = FetchHandle::next();
        task.attach_fetch(handle);

        assert_eq!(*owner.cancelled_fetches.lock(), vec![handle]);
    }

    #[test]
    fn test_detached_fetch_is_not_forwarded() {
        let (task, owner) = task_with_owner();
        task.attach_fetch(FetchHandle::next());
        task.detach_fetch();
        task.cancel();
        assert!(owner.cancelled_fetches.lock().is_empty());
    }

    #[test]
    fn test_cancel_with_dropped_owner() {
        let (task, owner) = task_with_owner();
        drop(owner);
        task.attach_fetch(FetchHandle::next());
        task.cancel();
        assert!(task.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (task, _owner) = task_with_owner();
        let waiter = task.clone();
        let join = tokio::spawn(async move { waiter.cancelled().await });
        task.cancel();
        join.await.unwrap();
    }

    // =========================================================================
    // Identity
    // =========================================================================

    #[test]
    fn test_clones_are_equal() {
        let (task, _owner) = task_with_owner();
        let clone = task.clone();
        assert_eq!(task, clone);

        let (other, _owner2) = task_with_owner();
        assert_ne!(task, other);
    }
}
