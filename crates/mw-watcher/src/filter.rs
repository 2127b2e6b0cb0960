//! Path filters for change events.
//!
//! Two filters live here, applied at different points of the data flow:
//!
//! - [`IgnoreFilter`] runs inside the watcher thread and drops paths under
//!   excluded directories (version control metadata, dependency caches) before
//!   they ever reach the channel.
//! - [`ExtensionFilter`] is the orchestrator's change filter: a pure predicate
//!   over the lowercase extension of the path.
//!
//! # Examples
//!
//! ```
//! use mw_watcher::{ExtensionFilter, FileFilter};
//! use camino::Utf8Path;
//!
//! let filter = ExtensionFilter::new([".md", ".mdx"]);
//! assert!(filter.should_process(Utf8Path::new("/docs/intro.md")));
//! assert!(filter.should_process(Utf8Path::new("/docs/Guide.MDX")));
//! assert!(!filter.should_process(Utf8Path::new("/docs/logo.png")));
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::Regex;
use smallvec::SmallVec;

use crate::error::WatchError;

/// Prefix marking an ignore pattern as a regular expression.
pub const REGEX_PREFIX: &str = "regex:";

/// A predicate deciding whether a changed path is relevant.
///
/// Filters must be [`Send`] and [`Sync`] because the ignore filter is used
/// from the blocking watcher thread.
///
/// # Examples
///
/// ```
/// use mw_watcher::FileFilter;
/// use camino::Utf8Path;
///
/// struct NoDrafts;
///
/// impl FileFilter for NoDrafts {
///     fn should_process(&self, path: &Utf8Path) -> bool {
///         !path.as_str().contains("/drafts/")
///     }
/// }
///
/// assert!(!NoDrafts.should_process(Utf8Path::new("/docs/drafts/a.md")));
/// ```
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if a change to `path` should be processed.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A filter that accepts all files.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl FileFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// Extension allow-list.
///
/// Extensions are compared case-insensitively and may be given with or
/// without the leading dot. An empty list accepts every path.
///
/// # Examples
///
/// ```
/// use mw_watcher::{ExtensionFilter, FileFilter};
/// use camino::Utf8Path;
///
/// let all = ExtensionFilter::new(Vec::<String>::new());
/// assert!(all.accepts_all());
/// assert!(all.should_process(Utf8Path::new("/docs/Makefile")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    /// Lowercase extensions with a leading dot.
    extensions: SmallVec<[String; 4]>,
}

impl ExtensionFilter {
    /// Creates a filter from the given extensions.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: SmallVec<[String; 4]> = SmallVec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.');
            if ext.is_empty() {
                continue;
            }
            let ext = format!(".{}", ext.to_lowercase());
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            extensions: normalized,
        }
    }

    /// Returns `true` if the allow-list is empty.
    #[must_use]
    pub fn accepts_all(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Returns the normalized extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl FileFilter for ExtensionFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        if self.accepts_all() {
            return true;
        }
        path.extension().is_some_and(|ext| {
            let ext = ext.to_lowercase();
            self.extensions
                .iter()
                .any(|allowed| allowed.strip_prefix('.') == Some(ext.as_str()))
        })
    }
}

/// Path-level exclusions applied upstream of the orchestrator.
///
/// Plain patterns use gitignore syntax relative to the watched root, so
/// `node_modules/` excludes every `node_modules` directory and everything
/// below it. Patterns starting with `regex:` are regular expressions matched
/// against the absolute path.
///
/// # Examples
///
/// ```
/// use mw_watcher::{FileFilter, IgnoreFilter};
/// use camino::Utf8Path;
///
/// let filter = IgnoreFilter::new(
///     Utf8Path::new("/srv/docs"),
///     &[".git/".to_owned(), r"regex:\.tmp$".to_owned()],
/// ).unwrap();
///
/// assert!(filter.is_ignored(Utf8Path::new("/srv/docs/.git/HEAD")));
/// assert!(filter.is_ignored(Utf8Path::new("/srv/docs/notes.md.tmp")));
/// assert!(filter.should_process(Utf8Path::new("/srv/docs/notes.md")));
/// ```
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    root: Utf8PathBuf,
    globs: Gitignore,
    regexes: Vec<Regex>,
}

impl IgnoreFilter {
    /// Compiles `patterns` for the tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] if any glob or regular
    /// expression fails to compile.
    pub fn new(root: &Utf8Path, patterns: &[String]) -> Result<Self, WatchError> {
        let mut builder = GitignoreBuilder::new(root.as_std_path());
        let mut regexes = Vec::new();

        for pattern in patterns {
            if let Some(expr) = pattern.strip_prefix(REGEX_PREFIX) {
                let regex =
                    Regex::new(expr).map_err(|e| WatchError::invalid_pattern(pattern.as_str(), e))?;
                regexes.push(regex);
            } else {
                builder
                    .add_line(None, pattern)
                    .map_err(|e| WatchError::invalid_pattern(pattern.as_str(), e))?;
            }
        }

        let globs = builder
            .build()
            .map_err(|e| WatchError::invalid_pattern(patterns.join(", "), e))?;

        Ok(Self {
            root: root.to_owned(),
            globs,
            regexes,
        })
    }

    /// Returns `true` if `path` is excluded by any pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Utf8Path) -> bool {
        if self.regexes.iter().any(|re| re.is_match(path.as_str())) {
            return true;
        }

        // The gitignore matcher only accepts paths strictly below its root.
        if path == self.root || !path.starts_with(&self.root) {
            return false;
        }

        self.globs
            .matched_path_or_any_parents(path.as_std_path(), path.is_dir())
            .is_ignore()
    }
}

impl FileFilter for IgnoreFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        !self.is_ignored(path)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

impl<F: FileFilter + ?Sized> FileFilter for std::sync::Arc<F> {
    fn should_process(&self, path: &Utf8Path) -> bool {
        (**self).should_process(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::DEFAULT_IGNORE_GLOBS;

    fn default_ignores() -> IgnoreFilter {
        let patterns: Vec<String> = DEFAULT_IGNORE_GLOBS.iter().map(|s| (*s).to_owned()).collect();
        IgnoreFilter::new(Utf8Path::new("/ws"), &patterns).expect("valid patterns")
    }

    #[test]
    fn test_accept_all_filter() {
        let filter = AcceptAllFilter;
        assert!(filter.should_process(Utf8Path::new("anything.txt")));
        assert!(filter.should_process(Utf8Path::new("")));
    }

    #[test]
    fn test_extension_filter_basic() {
        let filter = ExtensionFilter::new([".md", ".mdx"]);

        assert!(filter.should_process(Utf8Path::new("/ws/a.md")));
        assert!(filter.should_process(Utf8Path::new("/ws/b.mdx")));
        assert!(!filter.should_process(Utf8Path::new("/ws/c.txt")));
        assert!(!filter.should_process(Utf8Path::new("/ws/Makefile")));
        assert!(!filter.should_process(Utf8Path::new("/ws/md")));
    }

    #[test]
    fn test_extension_filter_case_insensitive() {
        let filter = ExtensionFilter::new(["MD"]);
        assert_eq!(filter.extensions(), &[".md".to_owned()]);
        assert!(filter.should_process(Utf8Path::new("/ws/README.MD")));
        assert!(filter.should_process(Utf8Path::new("/ws/readme.md")));
    }

    #[test]
    fn test_extension_filter_empty_matches_all() {
        let filter = ExtensionFilter::new(Vec::<String>::new());
        assert!(filter.accepts_all());
        assert!(filter.should_process(Utf8Path::new("/ws/image.png")));
        assert!(filter.should_process(Utf8Path::new("/ws/LICENSE")));
    }

    #[test]
    fn test_ignore_filter_default_directories() {
        let filter = default_ignores();

        assert!(filter.is_ignored(Utf8Path::new("/ws/.git/index")));
        assert!(filter.is_ignored(Utf8Path::new("/ws/.git/refs/heads/main")));
        assert!(filter.is_ignored(Utf8Path::new("/ws/site/node_modules/pkg/README.md")));
        assert!(filter.is_ignored(Utf8Path::new("/ws/tools/__pycache__/mod.pyc")));
        assert!(!filter.is_ignored(Utf8Path::new("/ws/docs/intro.md")));
        assert!(!filter.is_ignored(Utf8Path::new("/ws/gitnotes.md")));
    }

    #[test]
    fn test_ignore_filter_outside_root_is_not_ignored() {
        let filter = default_ignores();
        assert!(!filter.is_ignored(Utf8Path::new("/elsewhere/.git/index")));
        assert!(!filter.is_ignored(Utf8Path::new("/ws")));
    }

    #[test]
    fn test_ignore_filter_glob_pattern() {
        let filter = IgnoreFilter::new(Utf8Path::new("/ws"), &["*.draft.md".to_owned()])
            .expect("valid patterns");
        assert!(filter.is_ignored(Utf8Path::new("/ws/notes/plan.draft.md")));
        assert!(!filter.is_ignored(Utf8Path::new("/ws/notes/plan.md")));
    }

    #[test]
    fn test_ignore_filter_regex_pattern() {
        let filter = IgnoreFilter::new(Utf8Path::new("/ws"), &[r"regex:/archive/\d{4}/".to_owned()])
            .expect("valid patterns");
        assert!(filter.is_ignored(Utf8Path::new("/ws/archive/2021/a.md")));
        assert!(!filter.is_ignored(Utf8Path::new("/ws/archive/latest/a.md")));
    }

    #[test]
    fn test_ignore_filter_invalid_regex() {
        let err = IgnoreFilter::new(Utf8Path::new("/ws"), &["regex:(unclosed".to_owned()])
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_boxed_and_arc_filters() {
        let boxed: Box<dyn FileFilter> = Box::new(ExtensionFilter::new(["md"]));
        assert!(boxed.should_process(Utf8Path::new("/ws/a.md")));

        let shared = std::sync::Arc::new(ExtensionFilter::new(["md"]));
        assert!(!shared.should_process(Utf8Path::new("/ws/a.txt")));
    }
}
