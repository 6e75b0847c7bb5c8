//! Global logger writing to `~/.tutor/logs/latest.log`.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn is_debug_enabled() -> bool {
    std::env::var("TUTOR_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor")
        .join("logs")
}

fn filter() -> EnvFilter {
    let default = if is_debug_enabled() { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Falls back to stderr when the log file
/// cannot be created.
pub fn init_global_logger() -> anyhow::Result<PathBuf> {
    let dir = log_dir();
    let path = dir.join("latest.log");

    let file = fs::create_dir_all(&dir).and_then(|_| File::create(&path));
    match file {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .try_init()?;
            Ok(path)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
            tracing::warn!("Logging to stderr, cannot open {}: {}", path.display(), e);
            Ok(PathBuf::from("<stderr>"))
        }
    }
}
