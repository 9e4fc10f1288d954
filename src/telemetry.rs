//! Logging setup.
//!
//! Installs a `tracing` subscriber writing to stdout (text or JSON) and,
//! optionally, to a daily-rotated JSON log file.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Stdout log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Directory for rotated log files; stdout only when unset
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub max_files: usize,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            directory: None,
            file_prefix: "netsweep".to_string(),
            max_files: 7,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Installing twice is a no-op.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    match config.format {
        LogFormat::Text => layers.push(tracing_subscriber::fmt::layer().boxed()),
        LogFormat::Json => layers.push(tracing_subscriber::fmt::layer().json().boxed()),
    }

    let mut guard = None;
    if let Some(dir) = &config.directory {
        std::fs::create_dir_all(dir)?;

        let file_appender = tracing_appender::rolling::Builder::new()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(config.file_prefix.as_str())
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(dir)?;

        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .boxed(),
        );
        guard = Some(file_guard);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // Try to set as global default, but don't fail if already set
    let _ = tracing_subscriber::registry().with(layers).with(filter).try_init();

    Ok(guard)
}
