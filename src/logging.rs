//! Tracing subscriber setup
//!
//! Console output always; daily rolling `app.<date>.log` files when a log
//! directory is configured, pruned to `log.max_files`.

use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_FILTER: &str = "picture_api=info,tower_http=info";

/// File name prefix of the rolling log
pub const LOG_FILE_PREFIX: &str = "app";

/// File name suffix of the rolling log
pub const LOG_FILE_SUFFIX: &str = "log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER)))?;

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = file_appender(dir, config.max_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Daily appender keeping at most `max_files` files (at least one)
fn file_appender(dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(dir)?;
    Ok(appender)
}
