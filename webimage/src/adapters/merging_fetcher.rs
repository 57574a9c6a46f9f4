//! Fetcher that merges concurrent fetches of the same key.
//!
//! ```text
//! fetch("a") ─┐                     ┌─► waiter 1
//! fetch("a") ─┼─► one transfer ─────┼─► waiter 2
//! fetch("a") ─┘   (Transport::get)  └─► waiter 3
//! ```
//!
//! Each caller gets its own [`FetchHandle`]. Cancelling a handle drops only
//! that waiter; the transfer itself is aborted once no waiter is left.

use super::http::Transport;
use crate::ports::{FetchError, FetchHandle, FetchResponder, Fetcher, PendingFetch};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// One transfer and everyone waiting on it.
struct InFlight {
    /// Distinguishes a transfer from a later one for the same key
    generation: u64,
    waiters: HashMap<FetchHandle, FetchResponder>,
    abort: CancellationToken,
}

#[derive(Default)]
struct State {
    in_flight: HashMap<String, InFlight>,
    /// Which key each live handle is waiting on
    keys: HashMap<FetchHandle, String>,
    next_generation: u64,
}

/// Counters for monitoring merge effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergingFetcherStats {
    /// Calls to `fetch`
    pub requests: u64,
    /// Transfers started
    pub transfers: u64,
    /// Requests that joined an existing transfer
    pub merged: u64,
    /// Waiters withdrawn through `cancel`
    pub cancelled: u64,
    /// Transfers aborted because every waiter left
    pub aborted: u64,
}

impl MergingFetcherStats {
    /// Fraction of requests that joined an existing transfer (0.0 to 1.0).
    pub fn merge_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.merged as f64 / self.requests as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    transfers: AtomicU64,
    merged: AtomicU64,
    cancelled: AtomicU64,
    aborted: AtomicU64,
}

struct Inner<T> {
    transport: T,
    state: Mutex<State>,
    runtime: Handle,
    counters: Counters,
}

/// [`Fetcher`] that runs one transfer per distinct in-flight key.
pub struct MergingFetcher<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> MergingFetcher<T> {
    /// Creates a fetcher whose transfers run on `runtime`.
    pub fn new(transport: T, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                state: Mutex::new(State::default()),
                runtime,
                counters: Counters::default(),
            }),
        }
    }

    /// Number of transfers currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    pub fn stats(&self) -> MergingFetcherStats {
        let c = &self.inner.counters;
        MergingFetcherStats {
            requests: c.requests.load(Ordering::Relaxed),
            transfers: c.transfers.load(Ordering::Relaxed),
            merged: c.merged.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            aborted: c.aborted.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            requests = stats.requests,
            transfers = stats.transfers,
            merged = stats.merged,
            cancelled = stats.cancelled,
            aborted = stats.aborted,
            in_flight = self.in_flight_count(),
            merge_ratio = format!("{:.1}%", stats.merge_ratio() * 100.0),
            "Fetch merging statistics"
        );
    }

    fn start_transfer(&self, key: String, generation: u64, abort: CancellationToken) {
        self.inner.counters.transfers.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        self.inner.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    debug!(key = %key, "Transfer aborted, no waiters left");
                    return;
                }
                result = inner.transport.get(&key) => result,
            };
            inner.finish(&key, generation, result);
        });
    }
}

impl<T: Transport> Inner<T> {
    /// Hands `result` to every waiter of the transfer, if it is still the
    /// current one for `key`.
    fn finish(&self, key: &str, generation: u64, result: Result<Bytes, FetchError>) {
        let waiters = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            if state.in_flight.get(key).map(|f| f.generation) != Some(generation) {
                return;
            }
            let Some(flight) = state.in_flight.remove(key) else {
                return;
            };
            for handle in flight.waiters.keys() {
                state.keys.remove(handle);
            }
            flight.waiters
        };

        trace!(key, waiters = waiters.len(), "Transfer complete");
        for responder in waiters.into_values() {
            responder.respond(result.clone());
        }
    }
}

impl<T: Transport> Fetcher for MergingFetcher<T> {
    fn fetch(&self, key: &str) -> PendingFetch {
        self.inner.counters.requests.fetch_add(1, Ordering::Relaxed);

        let handle = FetchHandle::next();
        let (pending, responder) = PendingFetch::channel(handle);

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.keys.insert(handle, key.to_string());

        if let Some(flight) = state.in_flight.get_mut(key) {
            flight.waiters.insert(handle, responder);
            self.inner.counters.merged.fetch_add(1, Ordering::Relaxed);
            debug!(
                key,
                fetch = %handle,
                waiters = flight.waiters.len(),
                "Merging fetch into in-flight transfer"
            );
            return pending;
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        let abort = CancellationToken::new();

        let mut waiters = HashMap::new();
        waiters.insert(handle, responder);
        state.in_flight.insert(
            key.to_string(),
            InFlight {
                generation,
                waiters,
                abort: abort.clone(),
            },
        );
        drop(guard);

        trace!(key, fetch = %handle, "Starting transfer");
        self.start_transfer(key.to_string(), generation, abort);
        pending
    }

    fn cancel(&self, handle: FetchHandle) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        let Some(key) = state.keys.remove(&handle) else {
            return;
        };
        let Some(flight) = state.in_flight.get_mut(&key) else {
            return;
        };

        flight.waiters.remove(&handle);
        self.inner.counters.cancelled.fetch_add(1, Ordering::Relaxed);

        if flight.waiters.is_empty() {
            if let Some(flight) = state.in_flight.remove(&key) {
                flight.abort.cancel();
                self.inner.counters.aborted.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Last waiter cancelled, aborting transfer");
            }
        }
    }
}

impl<T: Transport> fmt::Debug for MergingFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergingFetcher")
            .field("in_flight", &self.in_flight_count())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Transport that blocks every transfer until released.
    struct GatedTransport {
        calls: AtomicUsize,
        gate: Semaphore,
        body: Result<Bytes, FetchError>,
    }

    impl GatedTransport {
        fn new(body: Result<Bytes, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                body,
            })
        }

        fn release(&self, transfers: usize) {
            self.gate.add_permits(transfers);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for Arc<GatedTransport> {
        async fn get(&self, _key: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| FetchError::Abandoned)?;
            self.body.clone()
        }
    }

    fn fetcher(transport: &Arc<GatedTransport>) -> MergingFetcher<Arc<GatedTransport>> {
        MergingFetcher::new(Arc::clone(transport), Handle::current())
    }

    async fn wait_for_calls(transport: &GatedTransport, expected: usize) {
        for _ in 0..200 {
            if transport.calls() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transport saw {} calls, expected {}", transport.calls(), expected);
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_transfer() {
        let transport = GatedTransport::new(Ok(Bytes::from_static(b"png")));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        let b = fetcher.fetch("img-1");
        assert_ne!(a.handle(), b.handle());
        assert_eq!(fetcher.in_flight_count(), 1);

        wait_for_calls(&transport, 1).await;
        transport.release(1);

        assert_eq!(a.wait().await.unwrap(), Bytes::from_static(b"png"));
        assert_eq!(b.wait().await.unwrap(), Bytes::from_static(b"png"));
        assert_eq!(transport.calls(), 1);

        let stats = fetcher.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.transfers, 1);
        assert_eq!(stats.merged, 1);
        assert_eq!(fetcher.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_merge() {
        let transport = GatedTransport::new(Ok(Bytes::new()));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        let b = fetcher.fetch("img-2");
        assert_eq!(fetcher.in_flight_count(), 2);

        transport.release(2);
        a.wait().await.unwrap();
        b.wait().await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_fans_out_to_all_waiters() {
        let error = FetchError::Status {
            key: "img-1".to_string(),
            status: 404,
        };
        let transport = GatedTransport::new(Err(error.clone()));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        let b = fetcher.fetch("img-1");
        transport.release(1);

        assert_eq!(a.wait().await, Err(error.clone()));
        assert_eq!(b.wait().await, Err(error));
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[tokio::test]
    async fn test_cancel_one_waiter_keeps_transfer() {
        let transport = GatedTransport::new(Ok(Bytes::from_static(b"data")));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        let b = fetcher.fetch("img-1");

        fetcher.cancel(a.handle());
        assert_eq!(a.wait().await, Err(FetchError::Abandoned));
        assert_eq!(fetcher.in_flight_count(), 1);

        transport.release(1);
        assert_eq!(b.wait().await.unwrap(), Bytes::from_static(b"data"));
        assert_eq!(fetcher.stats().aborted, 0);
    }

    #[tokio::test]
    async fn test_cancel_last_waiter_aborts_transfer() {
        let transport = GatedTransport::new(Ok(Bytes::from_static(b"data")));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        wait_for_calls(&transport, 1).await;

        fetcher.cancel(a.handle());
        assert_eq!(fetcher.in_flight_count(), 0);
        assert_eq!(fetcher.stats().aborted, 1);
        assert_eq!(a.wait().await, Err(FetchError::Abandoned));

        // A new fetch for the same key starts a fresh transfer
        let b = fetcher.fetch("img-1");
        wait_for_calls(&transport, 2).await;
        transport.release(1);
        assert_eq!(b.wait().await.unwrap(), Bytes::from_static(b"data"));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let transport = GatedTransport::new(Ok(Bytes::from_static(b"data")));
        let fetcher = fetcher(&transport);

        let a = fetcher.fetch("img-1");
        let handle = a.handle();
        transport.release(1);
        a.wait().await.unwrap();

        fetcher.cancel(handle);
        fetcher.cancel(handle);
        assert_eq!(fetcher.stats().cancelled, 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_handle_is_noop() {
        let transport = GatedTransport::new(Ok(Bytes::new()));
        let fetcher = fetcher(&transport);
        fetcher.cancel(FetchHandle::next());
        assert_eq!(fetcher.stats(), MergingFetcherStats::default());
    }

    #[test]
    fn test_merge_ratio() {
        let stats = MergingFetcherStats {
            requests: 4,
            merged: 1,
            ..Default::default()
        };
        assert!((stats.merge_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
