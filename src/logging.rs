use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Routes `tracing` output to the configured log file. The terminal belongs to
/// the UI, so nothing is written to stdout or stderr. Returns the file in use,
/// or `None` when logging is off.
pub fn init(cfg: &LoggingConfig) -> Result<Option<PathBuf>> {
    let Some(path) = cfg.file.as_ref() else {
        return Ok(None);
    };
    let file = open_log_file(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter(&cfg.level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("install log subscriber")?;
    Ok(Some(path.clone()))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}
