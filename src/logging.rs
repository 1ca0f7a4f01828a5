//! Logging infrastructure - structured tracing for binding and dispatch
//!
//! Design: Every event goes through `tracing` with an `event` field:
//! - Per-call events at `trace` (native calls, leaked callback state)
//! - Registrations at `debug`, module init and dispatcher lifecycle at `info`
//! - Filtered out before formatting when the level is off
//! - Console or file output, human-readable or JSON
//!
//! The library never installs a subscriber on its own; the host calls
//! `init()` or `typthon_bind_init` once.

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the background file writer alive
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; console when unset
    pub log_path: Option<String>,
    /// One JSON object per line instead of text
    pub json_format: bool,
    /// Emit span enter and close events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Read `TYPTHON_BIND_LOG_*` overrides on top of the defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // TYPTHON_BIND_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("TYPTHON_BIND_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        // TYPTHON_BIND_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("TYPTHON_BIND_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("TYPTHON_BIND_LOG_JSON").is_ok();
        config.show_spans = std::env::var("TYPTHON_BIND_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for chasing a marshaling problem
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: Some("typthon_bind.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(text: &str) -> Level {
    match text.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn file_writer(path: &str) -> (BoxMakeWriter, WorkerGuard) {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "typthon_bind.log".into());
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
    (BoxMakeWriter::new(writer), guard)
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration; later calls are no-ops
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("typthon_bind={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match &config.log_path {
            Some(path) => {
                let (writer, guard) = file_writer(path);
                let _ = FILE_GUARD.set(guard);
                writer
            }
            None => BoxMakeWriter::new(io::stderr),
        };

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(span_events)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_names(true)
                .boxed()
        };

        // A host that already installed a subscriber keeps it
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();
    });
}

/// Whether a subscriber was installed by this crate
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}
