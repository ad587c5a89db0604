//! Logging setup for the Morph CLI
//!
//! Logs go to stderr so that stdout carries only results. The filter comes
//! from `RUST_LOG` when set, otherwise from the `-v` count; the format can
//! be switched with `MORPH_LOG_FORMAT=compact|full|json`.

use crate::error::{Error, Result};
use is_terminal::IsTerminal;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{field, Span};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Identifies every log line of one CLI invocation
static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Colored output, only honored when stderr is a terminal
    pub ansi: bool,
    pub thread_ids: bool,
    /// File and line of each event
    pub source_location: bool,
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_verbosity(0)
    }
}

impl LoggingConfig {
    /// Map the `-v` count to a filter; `-vvv` and up also switches to the full format
    pub fn from_verbosity(verbosity: u8) -> Self {
        let (level, detailed) = match verbosity {
            0 => ("warn", false),
            1 => ("info", false),
            2 => ("debug", true),
            _ => ("trace", true),
        };

        Self {
            level: level.to_string(),
            format: if verbosity >= 3 { LogFormat::Full } else { LogFormat::Compact },
            ansi: true,
            thread_ids: verbosity >= 3,
            source_location: detailed,
        }
    }

    /// Apply `MORPH_LOG_FORMAT` from the environment
    pub fn merge_with_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("MORPH_LOG_FORMAT") {
            match raw.parse() {
                Ok(format) => self.format = format,
                // no subscriber yet, so stderr is the only channel
                Err(e) => eprintln!("Ignoring MORPH_LOG_FORMAT: {}", e),
            }
        }
    }
}

/// Install the global subscriber and assign the session id
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let ansi = config.ansi && std::io::stderr().is_terminal();

    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(config.thread_ids)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = match config.format {
        LogFormat::Compact => tracing::subscriber::set_global_default(fmt.with_ansi(ansi).compact().finish()),
        LogFormat::Full => tracing::subscriber::set_global_default(fmt.with_ansi(ansi).finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(fmt.with_ansi(false).json().finish()),
    };
    installed.map_err(|e| Error::other(format!("Failed to initialize logging: {}", e)))?;

    let session = SESSION_ID.get_or_init(new_session_id);
    tracing::debug!(session = %session, format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

/// Fresh `req_`-prefixed session id
pub fn new_session_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

/// Span tagged with the session id; `duration_ms` is filled in by [`timing::Timer`]
pub fn operation_span(operation: &str) -> Span {
    tracing::info_span!(
        "operation",
        operation = operation,
        session = SESSION_ID.get().map(String::as_str).unwrap_or("unknown"),
        duration_ms = field::Empty,
    )
}

pub mod timing {
    use std::time::Instant;
    use tracing::Span;

    /// Records how long an operation took when dropped
    pub struct Timer {
        operation: &'static str,
        started: Instant,
        span: Span,
    }

    impl Timer {
        pub fn new(operation: &'static str) -> Self {
            Self {
                operation,
                started: Instant::now(),
                span: super::operation_span(operation),
            }
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            self.span.record("duration_ms", elapsed_ms);
            tracing::debug!(operation = self.operation, duration_ms = elapsed_ms, "Operation finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let quiet = LoggingConfig::from_verbosity(0);
        assert_eq!(quiet.level, "warn");
        assert_eq!(quiet.format, LogFormat::Compact);
        assert!(!quiet.source_location);

        let debug = LoggingConfig::from_verbosity(2);
        assert_eq!(debug.level, "debug");
        assert!(debug.source_location);
        assert!(!debug.thread_ids);

        let trace = LoggingConfig::from_verbosity(5);
        assert_eq!(trace.level, "trace");
        assert_eq!(trace.format, LogFormat::Full);
        assert!(trace.thread_ids);
    }

    #[test]
    fn test_format_override_ignores_unknown_values() {
        let mut config = LoggingConfig::default();
        config.apply_overrides(|name| (name == "MORPH_LOG_FORMAT").then(|| "JSON".to_string()));
        assert_eq!(config.format, LogFormat::Json);

        config.apply_overrides(|_| Some("fancy".to_string()));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        assert!(a.starts_with("req_"));
        assert_ne!(a, new_session_id());
    }
}
