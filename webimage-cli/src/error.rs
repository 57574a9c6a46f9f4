//! CLI error handling with user-friendly messages and exit codes.

use std::fmt;
use std::process;
use webimage::config::ConfigFileError;
use webimage::OrchestratorError;

/// Exit code when at least one image failed to load.
pub const EXIT_LOAD_FAILED: i32 = 2;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Async runtime could not be started
    Runtime(std::io::Error),
    /// Loader could not be built
    Orchestrator(OrchestratorError),
    /// Some requests completed with an error
    LoadFailed { failed: usize, total: usize },
}

impl CliError {
    /// Exits the process with a message and an exit code for this error.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Fix the value in the config file, or remove the key to use its default.");
        }

        process::exit(self.exit_code())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::LoadFailed { .. } => EXIT_LOAD_FAILED,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Orchestrator(e) => write!(f, "Failed to create image loader: {}", e),
            CliError::LoadFailed { failed, total } => {
                write!(f, "{} of {} images failed to load", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Orchestrator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<OrchestratorError> for CliError {
    fn from(e: OrchestratorError) -> Self {
        CliError::Orchestrator(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::LoadFailed {
                failed: 1,
                total: 3
            }
            .exit_code(),
            EXIT_LOAD_FAILED
        );
        assert_eq!(CliError::LoggingInit("x".to_string()).exit_code(), 1);
    }

    #[test]
    fn test_display() {
        let err = CliError::LoadFailed {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 images failed to load");
    }
}
