//! Filesystem watcher with async event streaming.
//!
//! This module provides the [`FileWatcher`] type that bridges the synchronous
//! `notify` watcher to the async tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    Blocking Thread (spawn_blocking)              │
//! │  ┌───────────────────┐    ┌─────────────┐    ┌───────────────┐   │
//! │  │ RecommendedWatcher│ -> │ classify()  │ -> │ IgnoreFilter  │   │
//! │  │ (notify, raw)     │    │ add/change/ │    │ (path-level)  │   │
//! │  │                   │    │ unlink      │    │               │   │
//! │  └───────────────────┘    └─────────────┘    └───────┬───────┘   │
//! └──────────────────────────────────────────────────────│───────────┘
//!                                                        │ blocking_send
//!                                                        ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                         │
//! │  FileWatcher (shutdown ctrl) ── mpsc::Receiver ──► Orchestrator  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No debouncing happens here; every raw event is forwarded and the
//! orchestrator owns the quiescence window. Only changes made after
//! [`FileWatcher::start`] returns are reported.

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::WatchError;
use crate::events::{ChangeEvent, classify};
use crate::filter::FileFilter;

/// Default channel capacity for change events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A recursive filesystem watcher that streams [`ChangeEvent`]s.
///
/// # Lifecycle
///
/// 1. **Start**: [`FileWatcher::start`] validates the root, spawns a blocking
///    task owning the `notify` watcher, and waits until watching has begun.
///    Any setup failure is returned from `start`.
/// 2. **Receive**: [`FileWatcher::recv`] yields events already passed through
///    the provided path filter.
/// 3. **Close**: [`FileWatcher::close`] stops emission and joins the task. It
///    is idempotent; dropping the watcher also signals the task to stop.
///
/// # Examples
///
/// ```no_run
/// use mw_watcher::{FileWatcher, IgnoreFilter};
/// use camino::Utf8Path;
///
/// # async fn example() -> Result<(), mw_watcher::WatchError> {
/// let root = Utf8Path::new("/srv/docs");
/// let filter = IgnoreFilter::new(root, &[".git/".to_owned()])?;
/// let mut watcher = FileWatcher::start(root, filter).await?;
///
/// while let Some(event) = watcher.recv().await {
///     println!("{} {}", event.kind, event.path);
/// }
/// watcher.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher {
    /// Shutdown signal sender; `None` once shutdown has been initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the blocking watcher task; `None` once joined.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Event receiver for async consumption.
    event_rx: mpsc::Receiver<ChangeEvent>,

    /// The canonical root being watched.
    watch_path: Utf8PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watch_path", &self.watch_path)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the root doesn't exist and
    /// [`WatchError::Notify`] if the platform watcher fails to initialize.
    pub async fn start<F: FileFilter>(root: &Utf8Path, filter: F) -> Result<Self, WatchError> {
        Self::with_capacity(root, filter, DEFAULT_CHANNEL_CAPACITY).await
    }

    /// Starts a watcher with a custom channel capacity.
    ///
    /// A larger capacity absorbs bigger bursts (for example a `git checkout`)
    /// before the watcher thread has to wait for the consumer.
    pub async fn with_capacity<F: FileFilter>(
        root: &Utf8Path,
        filter: F,
        channel_capacity: usize,
    ) -> Result<Self, WatchError> {
        if !root.exists() {
            return Err(WatchError::path_not_found(root));
        }

        let watch_path = root.canonicalize_utf8()?;

        let (event_tx, event_rx) = mpsc::channel(channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let task_path = watch_path.clone();
        let task_handle = tokio::task::spawn_blocking(move || {
            run_watcher_loop(task_path, event_tx, shutdown_rx, ready_tx, filter)
        });

        if ready_rx.await.is_err() {
            // The task exited before watching began; surface its error.
            return match task_handle.await {
                Ok(Err(err)) => Err(err),
                Ok(Ok(())) | Err(_) => Err(WatchError::ChannelClosed),
            };
        }

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            watch_path,
        })
    }

    /// Receives the next change event.
    ///
    /// Returns `None` once the watcher has been closed or its task stopped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.event_rx.recv().await
    }

    /// Returns the canonical root being watched.
    #[must_use]
    pub fn watch_path(&self) -> &Utf8Path {
        &self.watch_path
    }

    /// Returns `true` if the watcher task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops emission and releases the platform watcher.
    ///
    /// Calling `close` more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher task panicked or failed.
    pub async fn close(&mut self) -> Result<(), WatchError> {
        // Closing the receiver first unblocks a watcher thread stuck on a
        // full channel.
        self.event_rx.close();

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Runs the notify watcher in a blocking context until shutdown.
#[allow(clippy::needless_pass_by_value)] // Owned values live for the whole blocking task
fn run_watcher_loop<F: FileFilter>(
    path: Utf8PathBuf,
    event_tx: mpsc::Sender<ChangeEvent>,
    shutdown_rx: oneshot::Receiver<()>,
    ready_tx: oneshot::Sender<()>,
    filter: F,
) -> Result<(), WatchError> {
    let tx = event_tx;
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(error = %error, "Watcher error");
                return;
            }
        };

        for (kind, raw_path) in classify(event) {
            let path = match Utf8PathBuf::try_from(raw_path) {
                Ok(p) => p,
                Err(e) => {
                    let invalid_path = e.into_path_buf();
                    tracing::warn!(
                        path = %invalid_path.display(),
                        "Skipping non-UTF-8 path in change event"
                    );
                    continue;
                }
            };

            if !filter.should_process(&path) {
                tracing::trace!(path = %path, "Ignored change event");
                continue;
            }

            if tx.blocking_send(ChangeEvent::new(path, kind)).is_err() {
                tracing::debug!("Event channel closed, dropping change events");
                break;
            }
        }
    })?;

    watcher.watch(path.as_std_path(), RecursiveMode::Recursive)?;

    tracing::info!(path = %path, "File watcher started");
    let _ = ready_tx.send(());

    let _ = shutdown_rx.blocking_recv();

    drop(watcher);
    tracing::info!(path = %path, "File watcher stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use crate::filter::{AcceptAllFilter, IgnoreFilter};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("Invalid path");
        (dir, path)
    }

    #[tokio::test]
    async fn test_watcher_start() {
        let (_dir, path) = create_temp_dir();

        let mut watcher = FileWatcher::start(&path, AcceptAllFilter)
            .await
            .expect("Watcher should start");
        assert!(watcher.is_running());
        assert!(!watcher.watch_path().as_str().is_empty());

        watcher.close().await.expect("Close failed");
    }

    #[tokio::test]
    async fn test_watcher_path_not_found() {
        let path = Utf8Path::new("/nonexistent/path/that/does/not/exist");

        let result = FileWatcher::start(path, AcceptAllFilter).await;
        match result {
            Err(WatchError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_watcher_close_is_idempotent() {
        let (_dir, path) = create_temp_dir();

        let mut watcher = FileWatcher::start(&path, AcceptAllFilter)
            .await
            .expect("Watcher should start");

        watcher.close().await.expect("First close failed");
        assert!(!watcher.is_running());
        watcher.close().await.expect("Second close failed");
        assert!(watcher.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_watcher_reports_new_file() {
        let (_dir, path) = create_temp_dir();

        let mut watcher = FileWatcher::with_capacity(&path, AcceptAllFilter, 16)
            .await
            .expect("Watcher should start");

        fs::write(path.join("note.md"), "hello").expect("Failed to write file");

        let event = tokio::time::timeout(Duration::from_secs(2), watcher.recv()).await;
        watcher.close().await.expect("Close failed");

        // Timing-dependent on some CI filesystems.
        if let Ok(Some(event)) = event {
            assert!(event.path.as_str().ends_with("note.md"));
            assert!(matches!(event.kind, ChangeKind::Add | ChangeKind::Change));
        }
    }

    #[tokio::test]
    async fn test_watcher_applies_ignore_filter() {
        let (_dir, path) = create_temp_dir();
        let canonical = path.canonicalize_utf8().expect("canonicalize");
        fs::create_dir(canonical.join(".git")).expect("mkdir");

        let filter = IgnoreFilter::new(&canonical, &[".git/".to_owned()]).expect("valid");
        let mut watcher = FileWatcher::start(&canonical, filter)
            .await
            .expect("Watcher should start");

        fs::write(canonical.join(".git/HEAD"), "ref").expect("write");
        fs::write(canonical.join("kept.md"), "# kept").expect("write");

        let mut seen = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(500), watcher.recv()).await
        {
            seen.push(event.path);
        }
        watcher.close().await.expect("Close failed");

        assert!(seen.iter().all(|p| !p.as_str().contains("/.git/")));
    }
}
