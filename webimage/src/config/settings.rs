//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. Parsing
//! lives in [`super::parser`], defaults in [`super::defaults`].

use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Memory cache settings
    pub cache: CacheSettings,
    /// HTTP fetch settings
    pub fetch: FetchSettings,
    /// Log output settings
    pub logging: LoggingSettings,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum decoded bytes kept in memory
    pub memory_size: usize,
}

impl CacheSettings {
    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Time allowed for one HTTP request, body included
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Idle pooled connections kept per host
    pub max_idle_per_host: usize,
}

impl FetchSettings {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.max_idle_per_host = max_idle;
        self
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory the log file is written to
    pub directory: PathBuf,
    /// Log file name inside `directory`
    pub file: String,
    /// Default level filter; `RUST_LOG` takes precedence
    pub level: String,
}

impl LoggingSettings {
    /// Full path of the log file.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file)
    }
}
