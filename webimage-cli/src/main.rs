//! webimage CLI
//!
//! Resolves one or more image URLs through the default loader stack and
//! prints a one-line summary per URL.

mod error;
mod runner;

use clap::{Parser, ValueEnum};
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};
use webimage::config::ConfigFile;
use webimage::{CacheTier, DecodedImage, DefaultOrchestrator, Editor, LoadError, LoadTask};

/// Loader shared by every request in this process.
static LOADER: OnceLock<DefaultOrchestrator> = OnceLock::new();

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EditKind {
    /// Convert to grayscale
    Grayscale,
    /// Downscale so the longest edge fits --size
    Thumbnail,
}

impl EditKind {
    fn editor(self, size: u32) -> Editor {
        match self {
            EditKind::Grayscale => Editor::grayscale(),
            EditKind::Thumbnail => Editor::thumbnail(size),
        }
    }
}

#[derive(Parser)]
#[command(name = "webimage", version)]
#[command(about = "Load images through a cache-first, cancellable loader", long_about = None)]
struct Args {
    /// Image URLs to load
    #[arg(required = true)]
    urls: Vec<String>,

    /// Config file (default: ~/.webimage/config.ini)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Editor to apply to each image
    #[arg(long, value_enum)]
    edit: Option<EditKind>,

    /// Longest edge for --edit thumbnail. Images already within this size
    /// are reported as "thumbnail not applied" rather than as failures.
    #[arg(long, default_value = "128")]
    size: u32,

    /// Cancel requests still running after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

/// A completion as received from the delivery thread.
struct Delivered {
    url: String,
    result: Result<DecodedImage, LoadError>,
    tier: CacheTier,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        e.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref(), args.verbose)?;
    runner.log_startup();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(load_all(&args, runner.config()))
}

/// Returns the process-wide loader, building it on first use.
fn loader(config: &ConfigFile) -> Result<&'static DefaultOrchestrator, CliError> {
    if let Some(loader) = LOADER.get() {
        return Ok(loader);
    }
    let built = DefaultOrchestrator::from_config(config)?;
    Ok(LOADER.get_or_init(|| built))
}

async fn load_all(args: &Args, config: &ConfigFile) -> Result<(), CliError> {
    let loader = loader(config)?;
    let editor = args.edit.map(|kind| kind.editor(args.size));
    let start = Instant::now();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let tasks: Vec<LoadTask> = args
        .urls
        .iter()
        .map(|url| {
            let tx = tx.clone();
            let reported = url.clone();
            loader.request(url.as_str(), editor.clone(), move |result, tier| {
                let _ = tx.send(Delivered {
                    url: reported,
                    result,
                    tier,
                });
            })
        })
        .collect();
    drop(tx);

    if let Some(ms) = args.cancel_after_ms {
        let pending = tasks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            for task in pending.iter().filter(|t| loader.is_active(t)) {
                warn!(task = %task.id(), key = task.key(), "Cancelling after deadline");
                task.cancel();
            }
        });
    }

    // The channel closes once every completion has run or been dropped by a
    // cancelled pipeline.
    let mut delivered = 0usize;
    let mut failed = 0usize;
    while let Some(outcome) = rx.recv().await {
        delivered += 1;
        let (line, is_failure) = report(&outcome, args.edit);
        if is_failure {
            failed += 1;
        }
        println!("{}", line);
    }

    for task in tasks.iter().filter(|t| t.is_cancelled()) {
        println!("{}: cancelled", task.key());
    }

    info!(
        total = tasks.len(),
        delivered,
        failed,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "All requests finished"
    );
    loader.log_stats();

    if failed > 0 {
        return Err(CliError::LoadFailed {
            failed,
            total: tasks.len(),
        });
    }
    Ok(())
}

/// Output line for one completion, and whether it counts as a failure.
///
/// The thumbnail editor declines images that already fit; that is reported
/// but not treated as a failed load.
fn report(outcome: &Delivered, edit: Option<EditKind>) -> (String, bool) {
    match (&outcome.result, edit) {
        (Ok(image), _) => (summary(&outcome.url, image, outcome.tier), false),
        (Err(LoadError::EditFailed { .. }), Some(EditKind::Thumbnail)) => (
            format!("{}: already within --size, thumbnail not applied", outcome.url),
            false,
        ),
        (Err(e), _) => (format!("{}: error: {}", outcome.url, e), true),
    }
}

/// One-line description of a loaded image.
fn summary(url: &str, image: &DecodedImage, tier: CacheTier) -> String {
    let mut line = format!(
        "{}: {}x{} {} ({})",
        url,
        image.width(),
        image.height(),
        image.format(),
        tier
    );
    if let Some(key) = image.edit_key() {
        line.push_str(&format!(" [{}]", key));
    }
    line
}
