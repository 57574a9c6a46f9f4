//! Execution context for CPU-bound decode and edit work.
//!
//! Decoding and editing can take tens of milliseconds for large images, so the
//! orchestrator never runs them on async worker threads. It hands them to a
//! [`BlockingExecutor`] instead.
//!
//! ```text
//! ┌─────────────────────┐
//! │    Orchestrator     │
//! │  - decode stage     │
//! │  - edit stage       │
//! └─────────┬───────────┘
//!           │ depends on
//!           ▼
//! ┌─────────────────────┐
//! │  BlockingExecutor   │
//! └─────────┬───────────┘
//!           │ implemented by
//!           ▼
//! ┌─────────────────────┐
//! │  TokioExecutor      │  spawn_blocking
//! └─────────────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Future returned by [`BlockingExecutor::execute_blocking`].
pub type BlockingResult<R> = Pin<Box<dyn Future<Output = Result<R, ExecutorError>> + Send>>;

/// Runs blocking closures off the async runtime.
pub trait BlockingExecutor: Send + Sync + 'static {
    /// Executes `f` on a pool dedicated to blocking work.
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;
}

/// Errors raised by the executor rather than by the work itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The closure panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// The runtime shut down before the closure finished.
    #[error("executor shut down")]
    Shutdown,
}

/// Production executor backed by `tokio::task::spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl BlockingExecutor for TokioExecutor {
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Box::pin(async move {
            tokio::task::spawn_blocking(f).await.map_err(|e| {
                if e.is_panic() {
                    ExecutorError::TaskPanicked(e.to_string())
                } else {
                    ExecutorError::Shutdown
                }
            })
        })
    }
}

/// Executes "blocking" work immediately on the calling thread.
#[cfg(test)]
pub struct SyncExecutor;

#[cfg(test)]
impl BlockingExecutor for SyncExecutor {
    fn execute_blocking<F, R>(&self, f: F) -> BlockingResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let result = f();
        Box::pin(std::future::ready(Ok(result)))
    }
}
