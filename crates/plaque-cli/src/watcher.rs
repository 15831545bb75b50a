//! File watcher for detecting notebook changes.
//!
//! Watches the directory of one notebook file and forwards debounced events
//! for that file over a tokio channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use thiserror::Error;
use tokio::sync::mpsc;

/// Delay used to coalesce bursts of writes from editors.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Errors from setting up the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to watch {}: {message}", path.display())]
    Notify { path: PathBuf, message: String },
}

/// File change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was written (or recreated).
    Modified(PathBuf),
    /// File was removed.
    Removed(PathBuf),
}

/// File watcher handle.
pub struct FileWatcher {
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl FileWatcher {
    /// Watch `path`, which must be an existing file.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        let target = path.as_ref().to_path_buf();
        if !target.is_file() {
            return Err(WatchError::NotAFile(target));
        }
        let watch_path = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        let filter_target = target.clone();
        let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("Watch error: {}", e);
                    return;
                }
            };
            for event in events {
                if event.path != filter_target {
                    continue;
                }
                let file_event = if event.path.exists() {
                    FileEvent::Modified(event.path)
                } else {
                    FileEvent::Removed(event.path)
                };
                let _ = tx.send(file_event);
            }
        })
        .map_err(|e| WatchError::Notify {
            path: watch_path.clone(),
            message: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Notify {
                path: watch_path.clone(),
                message: e.to_string(),
            })?;
        tracing::debug!("Watching {}", target.display());

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Receive the next file event.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        let notebook = temp.path().join("notebook.py");
        fs::write(&notebook, "x = 1\n").unwrap();

        assert!(FileWatcher::new(&notebook).is_ok());
    }

    #[test]
    fn test_watcher_rejects_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.py");
        assert!(matches!(FileWatcher::new(&missing), Err(WatchError::NotAFile(_))));
    }
}
