//! Error types for the mw-core crate.
//!
//! This module provides the [`ConfigError`] type for everything that can go
//! wrong while loading and resolving the watcher configuration. All of these
//! are fatal at startup: the process exits before any watching begins.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// # Examples
///
/// ```
/// use mw_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/some/path"));
/// assert!(error.to_string().contains("/some/path"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required field is absent from the configuration file.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A command array is empty or its program name is blank.
    #[error("command '{field}' must contain at least one non-empty program name")]
    EmptyCommand {
        /// The configuration field holding the command.
        field: &'static str,
    },

    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A required directory does not exist.
    #[error("missing required directory: {0}")]
    MissingDirectory(Utf8PathBuf),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: &'static str,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The configuration file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidPath`] error.
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::InvalidOption`] error.
    pub fn invalid_option(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let error = ConfigError::MissingField("extractorCommand");
        assert_eq!(
            error.to_string(),
            "missing required field 'extractorCommand'"
        );
    }

    #[test]
    fn test_empty_command_display() {
        let error = ConfigError::EmptyCommand {
            field: "indexCommand",
        };
        assert!(error.to_string().contains("indexCommand"));
    }

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("/invalid/path", "not a directory");
        let msg = error.to_string();
        assert!(msg.contains("/invalid/path"));
        assert!(msg.contains("not a directory"));
    }

    #[test]
    fn test_missing_directory_display() {
        let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/missing/dir"));
        assert!(error.to_string().contains("/missing/dir"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("serviceName", "must not be empty");
        let msg = error.to_string();
        assert!(msg.contains("serviceName"));
        assert!(msg.contains("must not be empty"));
    }
}
