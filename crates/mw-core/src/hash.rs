//! Fast hash set aliases for path collections.
//!
//! Change bursts can touch many files; the pending-change set is keyed by
//! path and is rebuilt on every burst, so it uses the Fx hash algorithm from
//! `rustc-hash` rather than the DoS-resistant std hasher.
//!
//! # Examples
//!
//! ```
//! use mw_core::{PathSet, path_set};
//! use camino::Utf8PathBuf;
//!
//! let mut set: PathSet = path_set();
//! assert!(set.insert(Utf8PathBuf::from("/docs/a.md")));
//! assert!(!set.insert(Utf8PathBuf::from("/docs/a.md")));
//! ```

use camino::Utf8PathBuf;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// A deduplicated set of absolute file paths.
pub type PathSet = FxHashSet<Utf8PathBuf>;

/// Creates a new empty [`PathSet`].
#[inline]
#[must_use]
pub fn path_set() -> PathSet {
    PathSet::default()
}

/// Drains `set` into a sorted vector, leaving it empty.
///
/// Sorting gives run reports and logs a stable order regardless of the
/// order in which changes arrived.
#[must_use]
pub fn drain_sorted(set: &mut PathSet) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<Utf8PathBuf> = set.drain().collect();
    paths.sort_unstable();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_set_dedups() {
        let mut set = path_set();
        set.insert(Utf8PathBuf::from("/a.md"));
        set.insert(Utf8PathBuf::from("/a.md"));
        set.insert(Utf8PathBuf::from("/b.md"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_drain_sorted_empties_set() {
        let mut set = path_set();
        set.insert(Utf8PathBuf::from("/c.md"));
        set.insert(Utf8PathBuf::from("/a.md"));
        set.insert(Utf8PathBuf::from("/b.md"));

        let drained = drain_sorted(&mut set);
        assert!(set.is_empty());
        assert_eq!(drained, vec!["/a.md", "/b.md", "/c.md"]);
    }
}
