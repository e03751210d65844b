//! Logging configuration with journald support on Linux.
//!
//! Runs from the command line log to journald when it is reachable and to a
//! daily rolling file otherwise. `--verbose` sends everything to stderr
//! instead, which is what you want when tuning thresholds by hand.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "ALBUM_SUGGESTER_LOG";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// journald on Linux, falling back to a rolling file in the given
    /// directory (or the default data directory).
    System(Option<PathBuf>),
    /// Human-readable output on stderr.
    Stderr,
}

/// Default directory for the rolling log file.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("album-suggester")
        .join("logs")
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the logging system.
///
/// Log level can be controlled via the `ALBUM_SUGGESTER_LOG` environment
/// variable (`debug`, `info`, `warn`, `error`, or any `EnvFilter` directive).
/// Defaults to `info`, or `debug` for [`LogTarget::Stderr`].
pub fn init(target: LogTarget) -> Result<()> {
    let log_dir = match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter("debug"))
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()?;
            return Ok(());
        }
        LogTarget::System(log_dir) => log_dir,
    };

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter("info"))
                .with(journald_layer)
                .try_init()?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "album-suggester.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread; keep it for the process lifetime.
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}
