//! Tracing setup for the siteref binaries
//!
//! Events go to a daily-rotated file derived from [`Config::log_path`];
//! nothing is written to the terminal, which carries command replies.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Flushes buffered log lines when dropped; hold it for the life of `main`.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the file subscriber. `RUST_LOG` takes precedence over `config.level`.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let (dir, file_name) = split_log_path(&Config::log_path())?;
    std::fs::create_dir_all(&dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &dir, &file_name);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter_for(&config.level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(
        log_dir = %dir.display(),
        file = %file_name,
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Route events to the test harness output. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for("debug"))
        .with_test_writer()
        .try_init();
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Directory and file-name prefix for the rolling appender.
fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Config(format!("log path has no file name: {}", path.display())))?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, file_name))
}
