//! Image request orchestration.
//!
//! The [`Orchestrator`] is the entry point of the crate. It turns
//! `request(key, editor, completion)` into a cache lookup, an optional
//! fetch + decode, an optional edit and a best-effort cache store, and hands
//! the caller a cancellable [`LoadTask`] before any of that starts.
//!
//! ```text
//!   request() ──► LoadTask (returned immediately)
//!       │
//!       ▼ spawned on the runtime
//!   ┌────────┐ hit  ┌──────────────────┐
//!   │ Lookup ├─────►│ Editing (if key  ├──────────────┐
//!   └───┬────┘      │ does not match)  │              │
//!       │ miss      └──────────────────┘              ▼
//!   ┌───▼──────┐   ┌──────────┐   ┌─────────┐   ┌──────────┐
//!   │ Fetching ├──►│ Decoding ├──►│ Editing ├──►│ Delivery │
//!   └──────────┘   └────┬─────┘   └─────────┘   └────┬─────┘
//!                       └────────────────────────────┤ no editor
//!                                                    ▼
//!                                              cache store
//! ```

mod pipeline;
mod stats;

pub use stats::{LoadStats, LoadStatsSnapshot};

use crate::adapters::{HttpTransport, MemoryCache, MergingFetcher, RasterDecoder};
use crate::config::ConfigFile;
use crate::decoded::DecodedImage;
use crate::delivery::Delivery;
use crate::editor::Editor;
use crate::error::LoadError;
use crate::executor::{BlockingExecutor, TokioExecutor};
use crate::ports::{CacheTier, FetchHandle, Fetcher, ImageCache, ImageDecoder};
use crate::task::{LoadTask, TaskId, TaskOwner, TaskRegistry};
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Errors raised while building an orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No Tokio runtime was available to run pipelines on.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// The delivery thread could not be started.
    #[error("failed to start delivery thread: {0}")]
    Delivery(#[from] std::io::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Orchestrator wired with the shipped adapters.
pub type DefaultOrchestrator =
    Orchestrator<MemoryCache, MergingFetcher<HttpTransport>, RasterDecoder>;

/// Coordinates image loads over the cache, fetch and decode ports.
///
/// Cloning is cheap; clones share the same ports, registry and delivery
/// thread.
pub struct Orchestrator<C, F, D, X = TokioExecutor>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    shared: Arc<Shared<C, F, D, X>>,
}

/// State shared between the orchestrator handle and its pipelines.
pub(crate) struct Shared<C, F, D, X> {
    pub(crate) cache: Arc<C>,
    pub(crate) fetcher: Arc<F>,
    pub(crate) decoder: Arc<D>,
    pub(crate) executor: X,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) delivery: Delivery,
    pub(crate) runtime: Handle,
    pub(crate) stats: LoadStats,
}

impl<C, F, D> Orchestrator<C, F, D, TokioExecutor>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
{
    /// Creates an orchestrator on the current Tokio runtime.
    ///
    /// Decoding and editing run on the runtime's blocking pool.
    pub fn new(cache: Arc<C>, fetcher: Arc<F>, decoder: Arc<D>) -> Result<Self, OrchestratorError> {
        let runtime =
            Handle::try_current().map_err(|e| OrchestratorError::NoRuntime(e.to_string()))?;
        Self::with_executor(cache, fetcher, decoder, TokioExecutor::new(), runtime)
    }
}

impl DefaultOrchestrator {
    /// Builds the shipped stack (memory cache, merging HTTP fetcher, raster
    /// decoder) from configuration, on the current Tokio runtime.
    pub fn from_config(config: &ConfigFile) -> Result<Self, OrchestratorError> {
        let runtime =
            Handle::try_current().map_err(|e| OrchestratorError::NoRuntime(e.to_string()))?;

        let cache = Arc::new(MemoryCache::new(config.cache.memory_size));
        let transport = HttpTransport::new(&config.fetch)
            .map_err(|e| OrchestratorError::HttpClient(e.to_string()))?;
        let fetcher = Arc::new(MergingFetcher::new(transport, runtime.clone()));
        let decoder = Arc::new(RasterDecoder::new());

        info!(
            memory_cache_bytes = config.cache.memory_size,
            timeout_secs = config.fetch.timeout.as_secs(),
            "Image orchestrator configured"
        );

        Self::with_executor(cache, fetcher, decoder, TokioExecutor::new(), runtime)
    }
}

impl<C, F, D, X> Orchestrator<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    /// Creates an orchestrator with an explicit decode/edit executor and the
    /// runtime its pipelines are spawned on.
    pub fn with_executor(
        cache: Arc<C>,
        fetcher: Arc<F>,
        decoder: Arc<D>,
        executor: X,
        runtime: Handle,
    ) -> Result<Self, OrchestratorError> {
        let delivery = Delivery::start()?;
        Ok(Self {
            shared: Arc::new(Shared {
                cache,
                fetcher,
                decoder,
                executor,
                registry: Arc::new(TaskRegistry::new()),
                delivery,
                runtime,
                stats: LoadStats::new(),
            }),
        })
    }

    /// Starts loading the image identified by `key`.
    ///
    /// Returns immediately. `completion` runs at most once, on the delivery
    /// thread, with the image (or the error) and the tier it came from. It
    /// never runs for a task that was cancelled first.
    ///
    /// When `editor` is given the delivered image is the editor's output; an
    /// edited image is never written back to the cache.
    pub fn request<Cb>(
        &self,
        key: impl Into<String>,
        editor: Option<Editor>,
        completion: Cb,
    ) -> LoadTask
    where
        Cb: FnOnce(Result<DecodedImage, LoadError>, CacheTier) + Send + 'static,
    {
        let shared = &self.shared;
        let owner: Weak<dyn TaskOwner> = Arc::downgrade(shared) as Weak<dyn TaskOwner>;
        let task = LoadTask::new(key, owner);
        shared.stats.record_request();

        if task.key().is_empty() {
            debug!(task = %task.id(), "Rejecting request with empty key");
            shared.complete(
                &task,
                completion,
                Err(LoadError::EmptyKey),
                CacheTier::None,
                false,
            );
            return task;
        }

        let registration = shared.registry.register(&task);
        debug!(
            task = %task.id(),
            key = %task.key(),
            editor = editor.as_ref().map(Editor::key),
            "Image requested"
        );

        let pipeline = Arc::clone(shared);
        let pipeline_task = task.clone();
        shared.runtime.spawn(async move {
            pipeline
                .drive(pipeline_task, editor, completion, registration)
                .await;
        });

        task
    }

    /// Number of requests that have neither completed nor been cancelled.
    pub fn active_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_active(&self, task: &LoadTask) -> bool {
        self.shared.registry.contains(task.id())
    }

    /// Cancels every active request and returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let tasks = self.shared.registry.snapshot();
        for task in &tasks {
            task.cancel();
        }
        if !tasks.is_empty() {
            info!(count = tasks.len(), "Cancelled all active image loads");
        }
        tasks.len()
    }

    pub fn stats(&self) -> LoadStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Logs the request counters at info level.
    pub fn log_stats(&self) {
        self.shared.stats.log();
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.shared.cache
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.shared.fetcher
    }
}

impl<C, F, D, X> Clone for Orchestrator<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C, F, D, X> fmt::Debug for Orchestrator<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("active", &self.shared.registry.len())
            .field("delivery", &self.shared.delivery)
            .finish_non_exhaustive()
    }
}

impl<C, F, D, X> TaskOwner for Shared<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    fn cancel_fetch(&self, handle: FetchHandle) {
        debug!(fetch = %handle, "Forwarding cancellation to fetcher");
        self.fetcher.cancel(handle);
    }

    fn release(&self, id: TaskId) {
        self.registry.remove(id);
    }
}

impl<C, F, D, X> Shared<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    /// Marks `task` done and schedules its completion on the delivery thread.
    ///
    /// Does nothing if the task was cancelled first. The completion is
    /// skipped as well if the task is cancelled while it waits in the
    /// delivery queue. With `store` set, a successful image is written to
    /// the cache just before the completion runs, and never for a task
    /// cancelled in the queue.
    pub(crate) fn complete<Cb>(
        self: &Arc<Self>,
        task: &LoadTask,
        completion: Cb,
        result: Result<DecodedImage, LoadError>,
        tier: CacheTier,
        store: bool,
    ) where
        Cb: FnOnce(Result<DecodedImage, LoadError>, CacheTier) + Send + 'static,
    {
        if task.finish().is_err() {
            self.stats.record_cancelled();
            return;
        }

        let shared = Arc::clone(self);
        let task = task.clone();
        let scheduled = self.delivery.schedule(move || {
            if task.is_cancelled() {
                shared.stats.record_cancelled();
                return;
            }
            shared.stats.record_completion(result.is_ok());
            if let (true, Ok(image)) = (store, &result) {
                shared.spawn_store(task.key().to_string(), image.clone());
            }
            completion(result, tier);
        });

        if !scheduled {
            warn!("Delivery thread is gone; completion dropped");
        }
    }

    /// Writes a freshly decoded image to the cache without blocking delivery.
    fn spawn_store(self: &Arc<Self>, key: String, image: DecodedImage) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            if let Err(error) = shared.cache.store(&key, image).await {
                shared.stats.record_store_failure();
                warn!(key = %key, error = %error, "Failed to store image in cache");
            }
        });
    }
}
