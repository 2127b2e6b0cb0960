//! Error types for the mw-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while starting or running the filesystem change source.

use camino::Utf8PathBuf;

/// Errors that can occur during file watching operations.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): Fatal - the watcher cannot start
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - root must exist
/// - **Invalid pattern** ([`WatchError::InvalidPattern`]): Fatal - bad ignore pattern
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - watcher task is gone
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - skip and continue
/// - **I/O errors** ([`WatchError::Io`]): Fatal
///
/// # Examples
///
/// ```
/// use mw_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     if err.is_fatal() {
///         eprintln!("Fatal watcher error: {err}");
///     } else {
///         eprintln!("Warning: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The specified path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// An ignore pattern could not be compiled.
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as written in the configuration.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The watcher task stopped unexpectedly.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::InvalidPattern`] error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_))
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}
