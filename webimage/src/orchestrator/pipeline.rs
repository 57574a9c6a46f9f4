//! The per-request load pipeline.
//!
//! One future per request walks the task through its stages. Every stage
//! transition goes through [`LoadTask::advance`] and every await point is
//! raced against the task's cancellation token, so a cancelled task stops at
//! the next opportunity and never reaches its completion.

use super::Shared;
use crate::decoded::DecodedImage;
use crate::editor::Editor;
use crate::error::LoadError;
use crate::executor::BlockingExecutor;
use crate::ports::{CacheTier, Fetcher, ImageCache, ImageDecoder};
use crate::task::{Cancelled, LoadTask, Registration, Stage};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a pipeline run produced for its caller.
struct Outcome {
    result: Result<DecodedImage, LoadError>,
    tier: CacheTier,
    /// Whether the delivered image should be written to the cache.
    store: bool,
}

impl Outcome {
    fn deliver(result: Result<DecodedImage, LoadError>, tier: CacheTier) -> Self {
        Self {
            result,
            tier,
            store: false,
        }
    }

    fn fail(error: LoadError) -> Self {
        Self::deliver(Err(error), CacheTier::None)
    }
}

/// Awaits `fut` unless `task` is cancelled first.
async fn cancellable<T>(task: &LoadTask, fut: impl Future<Output = T>) -> Result<T, Cancelled> {
    tokio::select! {
        biased;
        _ = task.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}

impl<C, F, D, X> Shared<C, F, D, X>
where
    C: ImageCache,
    F: Fetcher,
    D: ImageDecoder,
    X: BlockingExecutor,
{
    /// Runs the pipeline for `task` and delivers its outcome.
    ///
    /// The registration is held until the completion has been queued, so the
    /// task counts as active for the whole pipeline.
    pub(crate) async fn drive<Cb>(
        self: Arc<Self>,
        task: LoadTask,
        editor: Option<Editor>,
        completion: Cb,
        registration: Registration,
    ) where
        Cb: FnOnce(Result<DecodedImage, LoadError>, CacheTier) + Send + 'static,
    {
        match self.run(&task, editor.as_ref()).await {
            Ok(outcome) => {
                if let Err(error) = &outcome.result {
                    debug!(
                        task = %task.id(),
                        key = %task.key(),
                        error = %error,
                        "Image load failed"
                    );
                }

                let store = outcome.store && outcome.result.is_ok();
                self.complete(&task, completion, outcome.result, outcome.tier, store);
            }
            Err(Cancelled) => {
                trace!(task = %task.id(), key = %task.key(), "Pipeline stopped after cancellation");
                self.stats.record_cancelled();
            }
        }

        drop(registration);
    }

    async fn run(&self, task: &LoadTask, editor: Option<&Editor>) -> Result<Outcome, Cancelled> {
        let lookup = cancellable(task, self.cache.lookup(task.key())).await?;
        self.stats.record_lookup(lookup.tier);

        match lookup.image {
            Some(image) => self.serve_cached(task, image, lookup.tier, editor).await,
            None => self.load_remote(task, editor).await,
        }
    }

    /// Serves a cache hit, editing it first if the cached variant does not
    /// reflect the requested editor.
    async fn serve_cached(
        &self,
        task: &LoadTask,
        image: DecodedImage,
        tier: CacheTier,
        editor: Option<&Editor>,
    ) -> Result<Outcome, Cancelled> {
        trace!(task = %task.id(), tier = %tier, "Cache hit");

        let editor = match editor {
            Some(editor) if !editor.is_reflected_by(&image) => editor,
            _ => return Ok(Outcome::deliver(Ok(image), tier)),
        };

        task.advance(Stage::Editing)?;
        let edited = self.edit(task, editor, image).await?;
        Ok(Outcome::deliver(edited, CacheTier::None))
    }

    /// Fetches, decodes and optionally edits the image for a cache miss.
    async fn load_remote(
        &self,
        task: &LoadTask,
        editor: Option<&Editor>,
    ) -> Result<Outcome, Cancelled> {
        task.advance(Stage::Fetching)?;
        self.stats.record_fetch();

        let pending = self.fetcher.fetch(task.key());
        task.attach_fetch(pending.handle());
        trace!(task = %task.id(), fetch = %pending.handle(), "Fetch started");

        let fetched = cancellable(task, pending.wait()).await?;
        task.detach_fetch();

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(error) => return Ok(Outcome::fail(error.into())),
        };

        task.advance(Stage::Decoding)?;
        let decoder = Arc::clone(&self.decoder);
        let decoded = cancellable(
            task,
            self.executor.execute_blocking(move || decoder.decode(&bytes)),
        )
        .await?;

        let image = match decoded {
            Ok(Some(image)) => image,
            Ok(None) => return Ok(Outcome::fail(LoadError::InvalidData)),
            Err(error) => return Ok(Outcome::fail(error.into())),
        };

        if image.is_empty() {
            return Ok(Outcome::fail(LoadError::EmptyImage {
                width: image.width(),
                height: image.height(),
            }));
        }

        match editor {
            Some(editor) => {
                task.advance(Stage::Editing)?;
                let edited = self.edit(task, editor, image).await?;
                Ok(Outcome::deliver(edited, CacheTier::None))
            }
            None => Ok(Outcome {
                result: Ok(image),
                tier: CacheTier::None,
                store: true,
            }),
        }
    }

    /// Applies `editor` to `image` on the blocking executor.
    async fn edit(
        &self,
        task: &LoadTask,
        editor: &Editor,
        image: DecodedImage,
    ) -> Result<Result<DecodedImage, LoadError>, Cancelled> {
        self.stats.record_edit();

        let work = editor.clone();
        let edited = cancellable(
            task,
            self.executor.execute_blocking(move || work.apply(&image)),
        )
        .await?;

        Ok(match edited {
            Ok(Some(image)) => Ok(image),
            Ok(None) => Err(LoadError::EditFailed {
                editor: editor.key().to_string(),
            }),
            Err(error) => Err(error.into()),
        })
    }
}
