//! Default values for every configuration setting.

use super::settings::*;
use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// [cache]
// =============================================================================

/// Decoded bytes held by the memory cache (64 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// [fetch]
// =============================================================================

/// Per-request HTTP timeout.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Idle connections kept alive per host.
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 16;

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("webimage/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// [logging]
// =============================================================================

pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_LOG_FILE: &str = "webimage.log";

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Accepted values for `[logging] level`.
pub const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_CACHE_SIZE,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
