//! File watcher for the notes directory. Reports changed paths so tracked state can be swept.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify_debouncer_mini::notify;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};

/// Watches `root` and calls `on_change` with the changed paths (debounced).
/// Blocks until the watcher is stopped (e.g. Ctrl+C). Returns Ok when stopped, Err on setup failure.
pub fn watch_notes(root: &Path, on_change: impl Fn(Vec<PathBuf>) + Send + 'static) -> Result<(), WatchError> {
    if !root.is_dir() {
        return Err(WatchError::NotADirectory(root.to_path_buf()));
    }
    let root = root.canonicalize().map_err(WatchError::Canonicalize)?;

    let debounce = Duration::from_millis(400);
    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
        Ok(events) => on_change(events.into_iter().map(|e| e.path).collect()),
        Err(e) => log::warn!("watcher error: {}", e),
    })
    .map_err(|e| WatchError::Notify(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, notify::RecursiveMode::Recursive)
        .map_err(|e| WatchError::Watch(e.to_string()))?;
    log::info!("watching {}", root.display());

    let (_tx, rx) = mpsc::channel::<()>();
    rx.recv().ok();
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("watcher init: {0}")]
    Notify(String),
    #[error("watch failed: {0}")]
    Watch(String),
}
