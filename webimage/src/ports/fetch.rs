//! Fetch port definition.
//!
//! A fetch is split in two halves: the [`PendingFetch`] the orchestrator
//! awaits, and the [`FetchResponder`] the fetcher completes. The handle inside
//! the pending half is what a cancelled load task forwards to
//! [`Fetcher::cancel`].

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::oneshot;

/// Global counter for fetch handles.
static FETCH_HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one caller's interest in a fetch.
///
/// Merged fetches share a transfer but every caller gets its own handle, so
/// cancelling one caller does not disturb the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchHandle(u64);

impl FetchHandle {
    /// Allocates a new process-unique handle.
    pub fn next() -> Self {
        Self(FETCH_HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch-{}", self.0)
    }
}

/// Errors from fetching raw bytes.
///
/// Cloneable so a merged fetch can hand the same failure to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {key}")]
    Status { key: String, status: u16 },

    /// The request never produced a response (DNS, connect, timeout, body).
    #[error("transport error: {0}")]
    Transport(String),

    /// The fetcher dropped the request without answering.
    #[error("fetch abandoned before a response arrived")]
    Abandoned,
}

/// Completes a [`PendingFetch`].
#[derive(Debug)]
pub struct FetchResponder {
    tx: oneshot::Sender<Result<Bytes, FetchError>>,
}

impl FetchResponder {
    /// Sends the result. A waiter that has gone away is ignored.
    pub fn respond(self, result: Result<Bytes, FetchError>) {
        let _ = self.tx.send(result);
    }
}

/// An outstanding fetch as seen by the caller.
#[derive(Debug)]
pub struct PendingFetch {
    handle: FetchHandle,
    rx: oneshot::Receiver<Result<Bytes, FetchError>>,
}

impl PendingFetch {
    /// Creates a pending fetch and the responder that completes it.
    pub fn channel(handle: FetchHandle) -> (Self, FetchResponder) {
        let (tx, rx) = oneshot::channel();
        (Self { handle, rx }, FetchResponder { tx })
    }

    /// Creates a fetch that is already complete.
    pub fn ready(handle: FetchHandle, result: Result<Bytes, FetchError>) -> Self {
        let (pending, responder) = Self::channel(handle);
        responder.respond(result);
        pending
    }

    pub fn handle(&self) -> FetchHandle {
        self.handle
    }

    /// Waits for the result.
    ///
    /// A responder dropped without answering (for example because the fetch
    /// was cancelled) resolves as [`FetchError::Abandoned`].
    pub async fn wait(self) -> Result<Bytes, FetchError> {
        self.rx.await.unwrap_or(Err(FetchError::Abandoned))
    }
}

/// Retrieves raw bytes for a key.
///
/// Implementations are responsible for merging concurrent fetches of the same
/// key; the orchestrator issues one `fetch` per request and relies on that.
pub trait Fetcher: Send + Sync + 'static {
    /// Starts (or joins) a fetch for `key`.
    fn fetch(&self, key: &str) -> PendingFetch;

    /// Withdraws interest in the fetch identified by `handle`.
    ///
    /// Must be a no-op if the fetch already completed or was already
    /// cancelled.
    fn cancel(&self, handle: FetchHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_increasing() {
        let a = FetchHandle::next();
        let b = FetchHandle::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_handle_display() {
        let handle = FetchHandle::next();
        assert_eq!(handle.to_string(), format!("fetch-{}", handle.as_u64()));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            key: "https://example.com/cat.png".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://example.com/cat.png");
        assert_eq!(
            FetchError::Transport("connection refused".to_string()).to_string(),
            "transport error: connection refused"
        );
    }

    #[tokio::test]
    async fn test_ready_resolves_immediately() {
        let handle = FetchHandle::next();
        let pending = PendingFetch::ready(handle, Ok(Bytes::from_static(b"abc")));
        assert_eq!(pending.handle(), handle);
        assert_eq!(pending.wait().await.unwrap(), Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn test_channel_delivers_response() {
        let (pending, responder) = PendingFetch::channel(FetchHandle::next());

        tokio::spawn(async move {
            responder.respond(Err(FetchError::Transport("reset".to_string())));
        });

        assert_eq!(
            pending.wait().await,
            Err(FetchError::Transport("reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_dropped_responder_is_abandoned() {
        let (pending, responder) = PendingFetch::channel(FetchHandle::next());
        drop(responder);
        assert_eq!(pending.wait().await, Err(FetchError::Abandoned));
    }

    #[test]
    fn test_respond_after_waiter_dropped_is_ignored() {
        let (pending, responder) = PendingFetch::channel(FetchHandle::next());
        drop(pending);
        responder.respond(Ok(Bytes::new()));
    }
}
