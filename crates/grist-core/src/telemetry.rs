//! Logging setup for terminal applications.
//!
//! A TUI owns stdout, so log output goes to a file instead. Libraries in
//! this workspace only emit `tracing` events; the subscriber is installed
//! once by the application, usually through
//! [`ProgramOptions::log_file`](crate::ProgramOptions::log_file).

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::runtime::ProgramError;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log file, opened in append mode.
    pub path: PathBuf,
    /// Filter directive used when `RUST_LOG` is absent (e.g. `grist_widgets=debug`).
    pub filter: String,
}

impl LogConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Install a global `tracing` subscriber writing plain-text events to
/// `config.path`.
///
/// # Errors
///
/// Returns [`ProgramError::Io`] if the file cannot be opened and
/// [`ProgramError::Logging`] if a global subscriber is already installed.
pub fn init_file_logging(config: &LogConfig) -> Result<(), ProgramError> {
    let file = open_log_file(&config.path)?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_str()));

    fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| ProgramError::Logging(err.to_string()))
}

/// Open a log file in append mode, creating it if needed.
pub fn open_log_file(path: impl AsRef<Path>) -> Result<std::fs::File, std::io::Error> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_config_defaults_to_info() {
        let config = LogConfig::new("grist.log");
        assert_eq!(config.filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.path, PathBuf::from("grist.log"));
    }

    #[test]
    fn log_config_filter_override() {
        let config = LogConfig::new("grist.log").with_filter("grist_widgets=debug");
        assert_eq!(config.filter, "grist_widgets=debug");
    }

    #[test]
    fn open_log_file_appends() {
        use std::io::{Read, Write};

        let path = std::env::temp_dir().join(format!("grist-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let mut f = open_log_file(&path).unwrap();
            writeln!(f, "first").unwrap();
        }
        {
            let mut f = open_log_file(&path).unwrap();
            writeln!(f, "second").unwrap();
        }
        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "first\nsecond\n");
        let _ = std::fs::remove_file(&path);
    }
}
