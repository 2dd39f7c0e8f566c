//! Tracing setup
//!
//! Commands report to stderr while they run so stdout stays parseable. The file
//! log under `log_directory` is what survives a scheduled run: one file per day,
//! `backup-orchestrator.<date>.log`, trimmed by the appender to `log_max_files`.
//! `RUST_LOG` replaces the computed filters on both outputs.

use crate::config::{expand_tilde, GlobalConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "backup-orchestrator";
const LOG_FILE_SUFFIX: &str = "log";

/// Client stacks that flood the log at debug level during uploads
const CHATTY_TARGETS: &[&str] = &[
    "aws_config",
    "aws_sdk_s3",
    "aws_smithy_runtime",
    "hyper",
    "hyper_util",
    "rustls",
    "suppaftp",
];

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    /// Threshold for the file log; the console always shows INFO and above
    pub file_level: Level,
    /// Daily files kept; 0 keeps all of them
    pub keep_files: usize,
}

impl LoggingConfig {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            directory: expand_tilde(&global.log_directory),
            file_level: parse_level(&global.log_level),
            keep_files: global.log_max_files as usize,
        }
    }
}

/// Unknown names fall back to INFO rather than failing startup
fn parse_level(name: &str) -> Level {
    match name.trim().to_ascii_lowercase().as_str() {
        "warning" => Level::WARN,
        other => other.parse().unwrap_or(Level::INFO),
    }
}

/// `level` for everything, with the chatty client crates held at WARN or quieter
fn filter_for(level: Level) -> EnvFilter {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return from_env;
    }

    let global = LevelFilter::from_level(level);
    let quiet = global.min(LevelFilter::WARN);
    CHATTY_TARGETS
        .iter()
        .filter_map(|target| format!("{}={}", target, quiet).parse().ok())
        .fold(EnvFilter::default().add_directive(global.into()), |filter, directive| {
            filter.add_directive(directive)
        })
}

fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    fs::create_dir_all(&config.directory)
        .with_context(|| format!("Failed to create log directory: {:?}", config.directory))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(config.keep_files)
        .build(&config.directory)
        .with_context(|| format!("Failed to open log file in {:?}", config.directory))
}

/// Install the stderr and file subscribers.
///
/// Keep the returned guard alive until the process exits; dropping it flushes
/// lines still queued for the file.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let (writer, worker) = tracing_appender::non_blocking(file_appender(config)?);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter_for(config.file_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter_for(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging was already initialised")?;

    Ok(LogGuard { _worker: worker })
}

/// Stderr only, for commands that must not touch the log directory (`validate`)
pub fn init_console_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(Level::INFO))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub struct LogGuard {
    _worker: WorkerGuard,
}
