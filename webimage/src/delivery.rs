//! Serial delivery context for completion callbacks.
//!
//! Completions run one at a time, in the order they were scheduled, on a
//! dedicated thread that never runs pipeline work. This keeps slow or
//! re-entrant callbacks away from the async workers and the decode pool, and
//! lets a callback issue new requests without deadlocking anything.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// A scheduled completion.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Name given to the delivery thread.
pub const DELIVERY_THREAD_NAME: &str = "webimage-delivery";

/// Runs completions serially on a dedicated thread.
///
/// Dropping the delivery closes the queue; the thread runs whatever was
/// already scheduled and then exits on its own. It is never joined, since the
/// last owner may well be dropped from inside a callback or a runtime worker.
pub struct Delivery {
    tx: mpsc::UnboundedSender<Job>,
}

impl Delivery {
    /// Starts the delivery thread.
    pub fn start() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || Self::run_loop(rx))?;

        debug!("Delivery thread started");

        Ok(Self { tx })
    }

    /// Queues `job` behind everything already scheduled.
    ///
    /// Returns false if the delivery thread has gone away.
    pub fn schedule<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }

    fn run_loop(mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.blocking_recv() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Completion callback panicked");
            }
        }
        debug!("Delivery thread stopped");
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::mpsc as std_mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order() {
        let delivery = Delivery::start().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            assert!(delivery.schedule(move || seen.lock().push(i)));
        }

        let (tx, rx) = std_mpsc::channel();
        delivery.schedule(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_jobs_run_on_delivery_thread() {
        let delivery = Delivery::start().unwrap();
        let (tx, rx) = std_mpsc::channel();

        delivery.schedule(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some(DELIVERY_THREAD_NAME));
    }

    #[test]
    fn test_panicking_job_does_not_stop_delivery() {
        let delivery = Delivery::start().unwrap();
        let (tx, rx) = std_mpsc::channel();

        delivery.schedule(|| panic!("callback blew up"));
        delivery.schedule(move || tx.send(()).unwrap());

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_queued_jobs_run_after_drop() {
        let delivery = Delivery::start().unwrap();
        let (tx, rx) = std_mpsc::channel();

        delivery.schedule(move || tx.send(()).unwrap());
        drop(delivery);

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_job_can_schedule_more_work() {
        let delivery = Arc::new(Delivery::start().unwrap());
        let (tx, rx) = std_mpsc::channel();

        let inner = Arc::clone(&delivery);
        delivery.schedule(move || {
            inner.schedule(move || tx.send(()).unwrap());
        });

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
