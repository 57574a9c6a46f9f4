//! webimage - cache-first image loading with cancellable requests
//!
//! The [`Orchestrator`] resolves an image key through a cache, a fetcher and
//! a decoder, optionally applies a named [`Editor`], and reports the result
//! to a completion callback on a dedicated delivery thread. Every request
//! returns a [`LoadTask`] that can cancel it at any point.
//!
//! The three collaborators are ports ([`ports::ImageCache`],
//! [`ports::Fetcher`], [`ports::ImageDecoder`]); [`adapters`] ships a memory
//! cache, a merging HTTP fetcher and a raster decoder.
//!
//! ```no_run
//! use webimage::config::ConfigFile;
//! use webimage::{DefaultOrchestrator, Editor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = DefaultOrchestrator::from_config(&ConfigFile::default())?;
//!
//! let task = loader.request(
//!     "https://example.com/cat.png",
//!     Some(Editor::thumbnail(128)),
//!     |result, tier| match result {
//!         Ok(image) => println!("{}x{} ({tier})", image.width(), image.height()),
//!         Err(e) => eprintln!("load failed: {e}"),
//!     },
//! );
//!
//! // Changed our mind: the completion will not run.
//! task.cancel();
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod decoded;
pub mod delivery;
pub mod editor;
pub mod error;
pub mod executor;
pub mod format;
pub mod logging;
pub mod orchestrator;
pub mod ports;
pub mod task;

pub use decoded::DecodedImage;
pub use editor::Editor;
pub use error::{LoadError, LoadErrorKind};
pub use format::ImageFormat;
pub use orchestrator::{
    DefaultOrchestrator, LoadStats, LoadStatsSnapshot, Orchestrator, OrchestratorError,
};
pub use ports::CacheTier;
pub use task::{LoadTask, Stage, TaskId};

/// Version of the library, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
