//! Tracing setup for the lvface binaries.
//!
//! Without an explicit directory, logs go to the systemd journal when one is
//! reachable and to `<data dir>/logs/lvface.log.<date>` otherwise. An explicit
//! directory always gets the rolling file.

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "LVFACE_LOG";

/// ONNX Runtime reports every session and provider registration at info.
const DEFAULT_DIRECTIVES: &str = "info,ort=warn";

const LOG_FILE_PREFIX: &str = "lvface.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where log records end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    /// Daily rolling files in this directory.
    File(PathBuf),
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTarget::Journald => f.write_str("journald"),
            LogTarget::File(dir) => write!(f, "{}", dir.join(LOG_FILE_PREFIX).display()),
        }
    }
}

/// Install the global subscriber and report where records go.
///
/// Fails if a subscriber is already installed or the log directory cannot be
/// created. Callers may keep running without logs.
pub fn init(log_dir: Option<PathBuf>) -> Result<LogTarget> {
    #[cfg(target_os = "linux")]
    {
        if log_dir.is_none() {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(filter_from_env())
                    .with(journald_layer)
                    .try_init()?;

                tracing::debug!("Logging to journald");
                return Ok(LogTarget::Journald);
            }
        }
    }

    let dir = resolve_log_dir(log_dir);
    init_file(&dir)?;
    Ok(LogTarget::File(dir))
}

fn init_file(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(filter_from_env())
        .with(subscriber_fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    // Records are only flushed while the guard is alive
    let _ = FILE_GUARD.set(guard);

    tracing::debug!(dir = ?dir, "Logging to file");
    Ok(())
}

/// The directory the file backend writes to.
pub fn resolve_log_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| Config::data_dir().join("logs"))
}

fn filter_from_env() -> EnvFilter {
    filter_from(std::env::var(LOG_ENV).ok().as_deref())
}

/// Build the filter from `LVFACE_LOG`, falling back to the defaults when it
/// is unset or unparsable.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}
