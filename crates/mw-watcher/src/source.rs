//! The change source abstraction consumed by the orchestrator.
//!
//! A [`ChangeSource`] is anything that yields [`ChangeEvent`]s and can be
//! closed. The real implementation is [`FileWatcher`]; a plain
//! `tokio::sync::mpsc::Receiver<ChangeEvent>` also qualifies, which lets
//! tests and embedders feed events without touching the filesystem.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::ChangeEvent;
use crate::watcher::FileWatcher;

/// A stream of change events with an explicit close.
pub trait ChangeSource: Send {
    /// Waits for the next event. `None` means the source has ended.
    ///
    /// Implementations must be cancel-safe: the orchestrator polls this
    /// inside `tokio::select!`.
    fn recv(&mut self) -> impl Future<Output = Option<ChangeEvent>> + Send;

    /// Stops emission and releases resources. Must be idempotent.
    fn close(&mut self) -> impl Future<Output = Result<(), WatchError>> + Send;
}

impl ChangeSource for FileWatcher {
    async fn recv(&mut self) -> Option<ChangeEvent> {
        FileWatcher::recv(self).await
    }

    async fn close(&mut self) -> Result<(), WatchError> {
        FileWatcher::close(self).await
    }
}

impl ChangeSource for mpsc::Receiver<ChangeEvent> {
    async fn recv(&mut self) -> Option<ChangeEvent> {
        mpsc::Receiver::recv(self).await
    }

    async fn close(&mut self) -> Result<(), WatchError> {
        mpsc::Receiver::close(self);
        Ok(())
    }
}
