//! Error types for the mw-pipeline crate.
//!
//! [`StageError`] describes why a single pipeline stage failed. Stage errors
//! never escape the orchestrator: they end the current run attempt and put
//! the orchestrator into recovery wait.

use std::process::ExitStatus;

/// Errors produced by a [`StageRunner`](crate::StageRunner).
///
/// # Examples
///
/// ```
/// use mw_pipeline::StageError;
///
/// let err = StageError::ExitCode { label: "indexer".into(), code: 2 };
/// assert_eq!(err.label(), "indexer");
/// assert_eq!(err.exit_code(), Some(2));
/// assert_eq!(err.to_string(), "stage 'indexer' exited with code 2");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The stage command has no program to run.
    #[error("stage '{label}' has an empty command")]
    EmptyCommand {
        /// Stage label.
        label: String,
    },

    /// The process could not be started.
    #[error("stage '{label}' failed to spawn '{program}': {source}")]
    Spawn {
        /// Stage label.
        label: String,
        /// The program that could not be started.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a nonzero code.
    #[error("stage '{label}' exited with code {code}")]
    ExitCode {
        /// Stage label.
        label: String,
        /// The exit code.
        code: i32,
    },

    /// The process was terminated without an exit code (e.g. by a signal).
    #[error("stage '{label}' was terminated without an exit code")]
    Terminated {
        /// Stage label.
        label: String,
    },
}

impl StageError {
    /// Returns the label of the stage that failed.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::EmptyCommand { label }
            | Self::Spawn { label, .. }
            | Self::ExitCode { label, .. }
            | Self::Terminated { label } => label,
        }
    }

    /// Returns the exit code, if the process ran and exited with one.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitCode { code, .. } => Some(*code),
            Self::EmptyCommand { .. } | Self::Spawn { .. } | Self::Terminated { .. } => None,
        }
    }

    /// Converts a child exit status into `Ok(())` or the matching error.
    pub fn check_status(label: &str, status: ExitStatus) -> Result<(), Self> {
        if status.success() {
            return Ok(());
        }
        Err(match status.code() {
            Some(code) => Self::ExitCode {
                label: label.to_owned(),
                code,
            },
            None => Self::Terminated {
                label: label.to_owned(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_spawn_error_display() {
        let err = StageError::Spawn {
            label: "extractor".to_owned(),
            program: "docker".to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.label(), "extractor");
        assert_eq!(err.exit_code(), None);
        let msg = err.to_string();
        assert!(msg.contains("docker"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_terminated_has_no_code() {
        let err = StageError::Terminated {
            label: "validator".to_owned(),
        };
        assert_eq!(err.exit_code(), None);
        assert!(err.to_string().contains("validator"));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_status() {
        use std::os::unix::process::ExitStatusExt;

        assert!(StageError::check_status("indexer", ExitStatus::from_raw(0)).is_ok());

        // Raw wait status: exit code lives in the high byte.
        let err = StageError::check_status("indexer", ExitStatus::from_raw(3 << 8)).unwrap_err();
        assert_eq!(err.exit_code(), Some(3));

        // Killed by SIGKILL.
        let err = StageError::check_status("indexer", ExitStatus::from_raw(9)).unwrap_err();
        assert!(matches!(err, StageError::Terminated { .. }));
    }
}
