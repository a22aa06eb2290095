use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("hn-browse").join("hn-browse.log"))
}

/// Routes tracing output to a file, since the terminal belongs to the UI.
///
/// Returns the log path when a subscriber was installed. Logging stays off if
/// the file cannot be opened or another subscriber is already set.
pub fn init(config: &LogConfig) -> Option<PathBuf> {
    let path = config.file.clone().or_else(default_log_path)?;
    let file = open_log_file(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .ok()?;

    tracing::info!(version = crate::VERSION, path = %path.display(), "logging initialized");
    Some(path)
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}
