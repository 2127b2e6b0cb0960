//! Filesystem change source and change filters for minerva-watch.
//!
//! This crate turns raw `notify` events under a workspace root into a stream
//! of [`ChangeEvent`]s (`add`, `change`, `unlink`) for the orchestrator. It
//! knows nothing about debouncing or pipelines.
//!
//! # Overview
//!
//! - [`FileWatcher`] runs the platform watcher on a blocking thread and
//!   forwards events over a bounded channel.
//! - [`IgnoreFilter`] drops excluded paths (VCS metadata, dependency caches)
//!   inside the watcher thread, before events reach the channel.
//! - [`ExtensionFilter`] is the orchestrator-side change filter over the
//!   extension allow-list.
//! - [`ChangeSource`] abstracts the event stream so an in-memory channel can
//!   stand in for the filesystem.
//!
//! # Usage
//!
//! ```no_run
//! use mw_watcher::{ChangeSource, FileWatcher, IgnoreFilter};
//! use camino::Utf8Path;
//!
//! # async fn example() -> Result<(), mw_watcher::WatchError> {
//! let root = Utf8Path::new("/srv/docs");
//! let filter = IgnoreFilter::new(root, &["node_modules/".to_owned()])?;
//! let mut source = FileWatcher::start(root, filter).await?;
//!
//! if let Some(event) = source.recv().await {
//!     println!("{} {}", event.kind, event.path);
//! }
//! source.close().await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod source;
pub mod watcher;

pub use error::WatchError;
pub use events::{ChangeEvent, ChangeKind};
pub use filter::{AcceptAllFilter, ExtensionFilter, FileFilter, IgnoreFilter, REGEX_PREFIX};
pub use source::ChangeSource;
pub use watcher::FileWatcher;
