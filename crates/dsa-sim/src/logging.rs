//! # Logging
//!
//! Sets up a `tracing` subscriber for the generator. Workers run on rayon
//! threads, so thread names are on by default to tell their events apart.
//!
//! ```rust,ignore
//! use dsa_sim::logging::{init_logging, LogConfig, LogFormat};
//!
//! init_logging(&LogConfig {
//!     format: LogFormat::Json,
//!     ..Default::default()
//! });
//! tracing::info!(samples = 1000, "run started");
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Machine-readable, one JSON object per event
    Json,
    /// Multi-line, colored
    Pretty,
    /// One line per event
    #[default]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file:line of the event
    pub source_location: bool,
    pub thread_names: bool,
    /// Directive string such as `"dsa_sim=debug,dsa_core=warn"`; overrides
    /// `level` and `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            source_location: false,
            thread_names: true,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Verbose, pretty, with source locations.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            source_location: true,
            ..Default::default()
        }
    }

    /// Errors only.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            thread_names: false,
            ..Default::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match self.filter {
            Some(ref custom) => {
                EnvFilter::try_new(custom).unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
            }
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.to_string())),
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = config.env_filter();

    let result = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(config.thread_names),
            ),
        ),
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(config.thread_names),
            ),
        ),
        LogFormat::Compact => tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .compact()
                    .with_file(config.source_location)
                    .with_line_number(config.source_location)
                    .with_thread_names(config.thread_names),
            ),
        ),
    };

    // already installed
    let _ = result;
}
