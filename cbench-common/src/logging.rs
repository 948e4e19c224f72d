//! Structured logging initialization for cbench components.
//!
//! The telemetry framework reports degraded measurements through warnings
//! rather than errors, so embedders should initialize logging before any
//! device hook runs or those signals are lost.

use anyhow::Result;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    util::SubscriberInitExt,
};

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line logs (default; keeps stdout usable for results).
    Compact,
    /// Human-friendly, pretty-printed logs.
    Pretty,
    /// JSON-formatted logs for machine parsing.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional file path for daily-rotating logs.
    pub file_path: Option<PathBuf>,
    /// Per-target log level overrides.
    pub targets: BTreeMap<String, String>,
    /// Include target in log output.
    pub with_target: bool,
    /// Write console logs to stderr instead of stdout.
    pub use_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file_path: None,
            targets: BTreeMap::new(),
            with_target: true,
            // Benchmark results are printed to stdout; logs stay out of the way.
            use_stderr: true,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - CBENCH_LOG_LEVEL
    /// - CBENCH_LOG_FORMAT (compact|pretty|json)
    /// - CBENCH_LOG_FILE (path to rotating log file)
    /// - CBENCH_LOG_TARGETS (comma-separated target=level list)
    pub fn from_env(default_level: &str) -> Self {
        let mut config = Self {
            level: std::env::var("CBENCH_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string()),
            ..Self::default()
        };

        if let Ok(format) = std::env::var("CBENCH_LOG_FORMAT") {
            if let Some(parsed) = LogFormat::parse(&format) {
                config.format = parsed;
            }
        }

        if let Ok(path) = std::env::var("CBENCH_LOG_FILE") {
            if !path.trim().is_empty() {
                config.file_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(targets) = std::env::var("CBENCH_LOG_TARGETS") {
            config.targets = parse_target_overrides(&targets);
        }

        config
    }

    /// Override the base log level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Send a copy of all logs to a daily-rotating file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Build the effective EnvFilter, honoring RUST_LOG when set.
    pub fn env_filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some() {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }

        let mut filter = self.level.clone();
        for (target, level) in &self.targets {
            filter.push_str(&format!(",{}={}", target, level));
        }
        EnvFilter::new(filter)
    }
}

/// Guards required to keep background logging workers alive.
pub struct LoggingGuards {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize tracing-based logging for the current process.
///
/// Returns guards that must be kept alive for the duration of the run when
/// file logging is enabled. Safe to call more than once; later calls keep the
/// first subscriber.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let filter = config.env_filter();
    let (writer, file_guard) = build_writer(config);
    let ansi = file_guard.is_none();

    let builder = fmt::Subscriber::builder()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_env_filter(filter);

    match config.format {
        LogFormat::Compact => {
            finish_subscriber(builder.with_ansi(ansi).compact().finish(), file_guard)
        }
        LogFormat::Pretty => {
            finish_subscriber(builder.with_ansi(ansi).pretty().finish(), file_guard)
        }
        LogFormat::Json => finish_subscriber(builder.with_ansi(false).json().finish(), file_guard),
    }
}

fn build_writer(
    config: &LogConfig,
) -> (
    BoxMakeWriter,
    Option<tracing_appender::non_blocking::WorkerGuard>,
) {
    let base_writer = if config.use_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    if let Some(path) = config.file_path.as_ref() {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path.file_name().unwrap_or_else(|| OsStr::new("cbench.log"));
        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(base_writer.and(non_blocking)), Some(guard))
    } else {
        (base_writer, None)
    }
}

fn finish_subscriber<S>(
    subscriber: S,
    file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
) -> Result<LoggingGuards>
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = subscriber.try_init() {
        if !err.to_string().contains("already initialized") {
            return Err(err.into());
        }
    }

    Ok(LoggingGuards {
        _file_guard: file_guard,
    })
}

fn parse_target_overrides(value: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((target, level)) = entry.split_once('=') else {
            continue;
        };
        let target = target.trim();
        let level = level.trim().to_lowercase();
        if target.is_empty() || !is_valid_level(&level) {
            continue;
        }
        map.insert(target.to_string(), level);
    }
    map
}

fn is_valid_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error" | "off")
}
