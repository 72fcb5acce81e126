use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr and append to `log_path`. When the log file cannot be
/// opened (e.g. an unprivileged `plan`), logging continues on stderr only.
pub fn init_logging(log_path: &Path, debug: bool) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match open_log_file(log_path) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter(debug))
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;
        }
        Err(err) => {
            tracing_subscriber::registry()
                .with(env_filter(debug))
                .with(stderr_layer)
                .try_init()
                .map_err(|err| anyhow!("failed to install log subscriber: {err}"))?;
            warn!("file logging disabled: {err:#}");
        }
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file: {}", path.display()))
}
