//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use super::defaults::VALID_LOG_LEVELS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use ini::Ini;
use std::path::PathBuf;
use std::time::Duration;

/// Parses an `Ini` into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays the values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size = parse_size(v).map_err(|_| {
                ConfigFileError::invalid(
                    "cache",
                    "memory_size",
                    v,
                    "expected format like '64MB', '512KB' or '1GB'",
                )
            })?;
        }
    }

    // [fetch] section
    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("timeout_secs") {
            let secs: u64 = v.trim().parse().ok().filter(|s| *s > 0).ok_or_else(|| {
                ConfigFileError::invalid(
                    "fetch",
                    "timeout_secs",
                    v,
                    "must be a positive integer (seconds)",
                )
            })?;
            config.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if v.is_empty() {
                return Err(ConfigFileError::invalid(
                    "fetch",
                    "user_agent",
                    v,
                    "must not be empty",
                ));
            }
            config.fetch.user_agent = v.to_string();
        }
        if let Some(v) = section.get("max_idle_per_host") {
            config.fetch.max_idle_per_host = v.trim().parse().map_err(|_| {
                ConfigFileError::invalid(
                    "fetch",
                    "max_idle_per_host",
                    v,
                    "must be a non-negative integer",
                )
            })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
        if let Some(v) = section.get("level") {
            let level = v.trim().to_lowercase();
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigFileError::invalid(
                    "logging",
                    "level",
                    v,
                    "must be one of: error, warn, info, debug, trace",
                ));
            }
            config.logging.level = level;
        }
    }

    Ok(config)
}

/// Expands a leading `~/` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        parse_ini(&Ini::load_from_str(content).unwrap())
    }

    fn assert_invalid(content: &str, expected_section: &str, expected_key: &str) {
        match parse(content) {
            Err(ConfigFileError::InvalidValue { section, key, .. }) => {
                assert_eq!(section, expected_section);
                assert_eq!(key, expected_key);
            }
            other => panic!(
                "expected InvalidValue for {expected_section}.{expected_key}, got {other:?}"
            ),
        }
    }

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[cache]
memory_size = 128MB

[fetch]
timeout_secs = 30
user_agent = gallery/2.1
max_idle_per_host = 4

[logging]
directory = /var/log/gallery
file = loader.log
level = DEBUG
"#,
        )
        .unwrap();

        assert_eq!(config.cache.memory_size, 128 * 1024 * 1024);
        assert_eq!(config.fetch.timeout, Duration::from_secs(30));
        assert_eq!(config.fetch.user_agent, "gallery/2.1");
        assert_eq!(config.fetch.max_idle_per_host, 4);
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/gallery"));
        assert_eq!(config.logging.file, "loader.log");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = parse("[fetch]\nuser_agent = test-agent\n").unwrap();
        assert_eq!(config.fetch.user_agent, "test-agent");
        assert_eq!(
            config.fetch.timeout,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
        );
        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_CACHE_SIZE);
    }

    #[test]
    fn test_invalid_memory_size() {
        assert_invalid("[cache]\nmemory_size = lots\n", "cache", "memory_size");
    }

    #[test]
    fn test_invalid_timeout() {
        assert_invalid("[fetch]\ntimeout_secs = soon\n", "fetch", "timeout_secs");
        assert_invalid("[fetch]\ntimeout_secs = 0\n", "fetch", "timeout_secs");
    }

    #[test]
    fn test_invalid_max_idle() {
        assert_invalid("[fetch]\nmax_idle_per_host = -1\n", "fetch", "max_idle_per_host");
    }

    #[test]
    fn test_invalid_log_level() {
        assert_invalid("[logging]\nlevel = loud\n", "logging", "level");
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        let config = parse("[provider]\ntype = bing\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("rel/path"), PathBuf::from("rel/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        }
    }
}
