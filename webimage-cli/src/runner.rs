//! CLI runner for common setup.
//!
//! Loads configuration and initializes logging before any request is made.

use crate::error::CliError;
use std::path::Path;
use tracing::info;
use webimage::config::ConfigFile;
use webimage::logging::{init_logging, LoggingGuard};

/// Owns the configuration and keeps logging alive for the CLI's lifetime.
pub struct CliRunner {
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads `config_path` (or the default config file) and starts logging.
    ///
    /// `verbose` forces debug-level logging unless `RUST_LOG` says otherwise.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let mut config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        if verbose {
            config.logging.level = "debug".to_string();
        }

        let logging_guard =
            init_logging(&config.logging).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self) {
        info!("webimage v{}", webimage::VERSION);
        info!(
            log_file = %self.config.logging.path().display(),
            "Logging initialized"
        );
    }
}
