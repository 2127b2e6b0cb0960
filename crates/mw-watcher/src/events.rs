//! Event types for file change notifications.
//!
//! Raw `notify` events are translated into [`ChangeEvent`]s carrying one of
//! three kinds: `add`, `change`, or `unlink`.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//!   notify::Event (kind + paths)
//!        │  classify()
//!        ▼
//!   (ChangeKind, path) pairs ── IgnoreFilter ──► ChangeEvent ──► channel
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use camino::Utf8PathBuf;
use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use smallvec::SmallVec;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A file appeared (created or renamed into place).
    Add,
    /// A file's contents or metadata changed.
    Change,
    /// A file disappeared (removed or renamed away).
    Unlink,
}

impl ChangeKind {
    /// Returns the short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single path change reported by a change source.
///
/// # Examples
///
/// ```
/// use mw_watcher::{ChangeEvent, ChangeKind};
/// use camino::Utf8PathBuf;
///
/// let event = ChangeEvent::new(Utf8PathBuf::from("/docs/intro.md"), ChangeKind::Change);
/// assert_eq!(event.extension(), Some("md"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the file that changed.
    pub path: Utf8PathBuf,

    /// What happened to it.
    pub kind: ChangeKind,

    /// When the event was received.
    pub timestamp: Instant,
}

impl ChangeEvent {
    /// Creates a new change event stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Returns the file extension, if any, as written on disk.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path.extension()
    }
}

/// Translates a raw `notify` event into `(kind, path)` pairs.
///
/// Access events and directory creations produce nothing. A rename reported
/// as a single event yields an `unlink` for the old path and an `add` for the
/// new one.
pub(crate) fn classify(event: notify::Event) -> SmallVec<[(ChangeKind, PathBuf); 2]> {
    let mut out = SmallVec::new();
    let notify::Event { kind, paths, .. } = event;

    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Access(_) | EventKind::Other => {}
        EventKind::Create(_) => out.extend(paths.into_iter().map(|p| (ChangeKind::Add, p))),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => out.extend(paths.into_iter().map(|p| (ChangeKind::Unlink, p))),
            RenameMode::To => out.extend(paths.into_iter().map(|p| (ChangeKind::Add, p))),
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                if let Some(from) = paths.next() {
                    out.push((ChangeKind::Unlink, from));
                }
                if let Some(to) = paths.next() {
                    out.push((ChangeKind::Add, to));
                }
            }
            RenameMode::Any | RenameMode::Other => {
                for path in paths {
                    let kind = if path.exists() {
                        ChangeKind::Add
                    } else {
                        ChangeKind::Unlink
                    };
                    out.push((kind, path));
                }
            }
        },
        EventKind::Modify(_) | EventKind::Any => {
            out.extend(paths.into_iter().map(|p| (ChangeKind::Change, p)));
        }
        EventKind::Remove(_) => out.extend(paths.into_iter().map(|p| (ChangeKind::Unlink, p))),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |ev, p| ev.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Add.to_string(), "add");
        assert_eq!(ChangeKind::Change.to_string(), "change");
        assert_eq!(ChangeKind::Unlink.to_string(), "unlink");
    }

    #[test]
    fn test_change_event_extension() {
        let event = ChangeEvent::new("/docs/guide.MDX", ChangeKind::Add);
        assert_eq!(event.extension(), Some("MDX"));

        let no_ext = ChangeEvent::new("/docs/Makefile", ChangeKind::Add);
        assert_eq!(no_ext.extension(), None);
    }

    #[test]
    fn test_classify_create_and_remove() {
        let created = classify(event(EventKind::Create(CreateKind::File), &["/d/a.md"]));
        assert_eq!(created.as_slice(), &[(ChangeKind::Add, PathBuf::from("/d/a.md"))]);

        let removed = classify(event(EventKind::Remove(RemoveKind::File), &["/d/a.md"]));
        assert_eq!(removed.as_slice(), &[(ChangeKind::Unlink, PathBuf::from("/d/a.md"))]);
    }

    #[test]
    fn test_classify_modify_is_change() {
        let modified = classify(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/d/a.md"],
        ));
        assert_eq!(modified.as_slice(), &[(ChangeKind::Change, PathBuf::from("/d/a.md"))]);
    }

    #[test]
    fn test_classify_rename_both() {
        let renamed = classify(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/d/old.md", "/d/new.md"],
        ));
        assert_eq!(
            renamed.as_slice(),
            &[
                (ChangeKind::Unlink, PathBuf::from("/d/old.md")),
                (ChangeKind::Add, PathBuf::from("/d/new.md")),
            ]
        );
    }

    #[test]
    fn test_classify_ignores_access_and_folders() {
        assert!(classify(event(EventKind::Access(AccessKind::Any), &["/d/a.md"])).is_empty());
        assert!(classify(event(EventKind::Create(CreateKind::Folder), &["/d/sub"])).is_empty());
    }
}
