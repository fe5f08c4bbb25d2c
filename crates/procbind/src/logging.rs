//! Tracing subscriber setup for applications embedding procbind
//!
//! The library crates only emit `tracing` events and spans. Binaries call
//! [`init`] once at startup to send them to the console, to a JSON file that
//! rolls daily, or both. `RUST_LOG` overrides the configured filter.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "procbind.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log
    pub log_dir: PathBuf,

    /// Write JSON lines to a daily rolling file
    pub enable_json_logs: bool,

    /// Pretty console output
    pub enable_console_logs: bool,

    /// Include file and line of each event
    pub include_location: bool,

    /// Log span open and close, which times every procedure call
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: concat!(
                "info,procbind=debug,procbind_query=debug,procbind_connection=debug,",
                "procbind_driver_mssql=debug,procbind_driver_memory=debug"
            )
            .to_string(),
        }
    }
}

impl LoggingConfig {
    /// JSON file only, quiet console
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: false,
            include_location: false,
            enable_spans: false,
            default_filter: concat!(
                "warn,procbind_query=info,procbind_connection=info,",
                "procbind_driver_mssql=info"
            )
            .to_string(),
        }
    }

    /// Verbose console and JSON file
    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, everything at debug
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("procbind-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }
}

/// Keeps the background log writer alive; dropping it flushes the file
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW and CLOSE only: ENTER fires again on every poll of an instrumented future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut file_guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );

    Ok(LoggingGuard { _file: file_guard })
}

/// Initialize with the development preset in debug builds and production otherwise
pub fn init_default() -> anyhow::Result<LoggingGuard> {
    if cfg!(debug_assertions) {
        init(LoggingConfig::development())
    } else {
        init(LoggingConfig::production())
    }
}

/// `<local data dir>/procbind/logs`
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procbind")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = LoggingConfig::production();
        assert!(production.enable_json_logs);
        assert!(!production.enable_console_logs);
        assert!(production.default_filter.starts_with("warn"));

        let testing = LoggingConfig::testing();
        assert!(!testing.enable_json_logs);
        assert_eq!(testing.default_filter, "debug");

        assert!(log_directory().ends_with("procbind/logs"));
    }

    #[test]
    fn test_init_writes_log_directory_and_rejects_second_init() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_dir: dir.path().join("logs"),
            enable_json_logs: true,
            enable_console_logs: false,
            ..LoggingConfig::testing()
        };

        let guard = init(config.clone()).unwrap();
        assert!(dir.path().join("logs").is_dir());
        assert!(init(config).is_err());
        drop(guard);
    }
}
