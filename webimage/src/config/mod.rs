//! Configuration for the loader and its shipped adapters.
//!
//! Settings are grouped per concern, one struct per `[section]` of the INI
//! file, each with `DEFAULT_*` constants and `with_*` builders.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use webimage::config::{ConfigFile, FetchSettings};
//!
//! let fetch = FetchSettings::default().with_timeout(Duration::from_secs(5));
//! assert_eq!(fetch.timeout, Duration::from_secs(5));
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.cache.memory_size, webimage::config::DEFAULT_MEMORY_CACHE_SIZE);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, ConfigFile, FetchSettings, LoggingSettings};
pub use size::{format_size, parse_size, SizeParseError};
