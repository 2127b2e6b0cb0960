//! Stage runners: how one pipeline stage is executed.
//!
//! The orchestrator only sees the [`StageRunner`] trait. Three
//! implementations are provided:
//!
//! - [`CommandRunner`] spawns the command and waits for it to exit.
//! - [`DryRunRunner`] logs what would run and succeeds after a short delay.
//! - [`RecordingRunner`] records invocations in memory and can be told to
//!   fail, for exercising the orchestrator deterministically.

use std::fmt::Write as _;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use tokio::process::Command;

use crate::error::StageError;

/// Delay the dry-run runner waits before reporting success.
pub const DRY_RUN_DELAY: Duration = Duration::from_millis(100);

/// Executes a single pipeline stage.
///
/// A stage succeeds only when the command exits with code zero. Any other
/// outcome is reported as a [`StageError`] carrying the stage label.
pub trait StageRunner: Send + Sync + 'static {
    /// Runs `command` for the stage named `label`.
    fn run(
        &self,
        command: &[String],
        label: &str,
    ) -> impl Future<Output = Result<(), StageError>> + Send;
}

/// Renders an argv as a copy-pasteable shell command line.
///
/// # Examples
///
/// ```
/// use mw_pipeline::format_command;
///
/// let argv = ["docker", "compose", "run", "--rm", "minerva", "echo", "hello world"];
/// assert_eq!(
///     format_command(&argv.map(String::from)),
///     "docker compose run --rm minerva echo 'hello world'"
/// );
/// ```
#[must_use]
pub fn format_command(command: &[String]) -> String {
    let mut line = String::new();
    for (i, arg) in command.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let plain = !arg.is_empty()
            && arg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
        if plain {
            line.push_str(arg);
        } else {
            let _ = write!(line, "'{}'", arg.replace('\'', r"'\''"));
        }
    }
    line
}

fn split_command<'a>(command: &'a [String], label: &str) -> Result<(&'a String, &'a [String]), StageError> {
    command.split_first().ok_or_else(|| StageError::EmptyCommand {
        label: label.to_owned(),
    })
}

/// Spawns stage commands as child processes.
///
/// Children inherit stdout and stderr, get a null stdin, and are killed if
/// the run attempt is dropped (for example on shutdown).
#[derive(Debug, Clone)]
pub struct CommandRunner {
    working_dir: Utf8PathBuf,
}

impl CommandRunner {
    /// Creates a runner executing commands in `working_dir`.
    pub fn new(working_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Returns the working directory for spawned commands.
    #[must_use]
    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }
}

impl StageRunner for CommandRunner {
    async fn run(&self, command: &[String], label: &str) -> Result<(), StageError> {
        let (program, args) = split_command(command, label)?;

        tracing::debug!(
            stage = label,
            command = %format_command(command),
            cwd = %self.working_dir,
            "Spawning stage process"
        );

        let status = Command::new(program)
            .args(args)
            .current_dir(self.working_dir.as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| StageError::Spawn {
                label: label.to_owned(),
                program: program.clone(),
                source,
            })?;

        StageError::check_status(label, status)
    }
}

/// Logs the resolved command instead of running it.
#[derive(Debug, Clone)]
pub struct DryRunRunner {
    working_dir: Utf8PathBuf,
    delay: Duration,
}

impl DryRunRunner {
    /// Creates a dry-run runner reporting `working_dir` as the execution
    /// directory.
    pub fn new(working_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            delay: DRY_RUN_DELAY,
        }
    }

    /// Overrides the simulated stage duration.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl StageRunner for DryRunRunner {
    async fn run(&self, command: &[String], label: &str) -> Result<(), StageError> {
        split_command(command, label)?;

        tracing::info!(
            stage = label,
            cwd = %self.working_dir,
            command = %format_command(command),
            "[dry-run] Would execute stage"
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// One call observed by a [`RecordingRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Stage label.
    pub label: String,
    /// The argv the stage was asked to run.
    pub command: Vec<String>,
}

#[derive(Debug, Default)]
struct RecorderState {
    invocations: Mutex<Vec<Invocation>>,
    failing: AtomicBool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Records every invocation instead of running anything.
///
/// Cloning yields another handle to the same log, so a test can keep one
/// handle while the orchestrator owns the other.
///
/// # Examples
///
/// ```
/// use mw_pipeline::{RecordingRunner, StageRunner};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = RecordingRunner::new();
/// runner.run(&["extract".to_owned()], "extractor").await.unwrap();
///
/// runner.set_failing(true);
/// assert!(runner.run(&["index".to_owned()], "indexer").await.is_err());
/// assert_eq!(runner.labels(), ["extractor", "indexer"]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    state: Arc<RecorderState>,
    delay: Duration,
}

impl RecordingRunner {
    /// Creates a runner where every invocation succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner where every invocation fails with exit code 1.
    #[must_use]
    pub fn failing() -> Self {
        let runner = Self::default();
        runner.set_failing(true);
        runner
    }

    /// Makes each invocation take `delay` before completing.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Switches between failing and succeeding for subsequent invocations.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns all invocations so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.invocations.lock().clone()
    }

    /// Returns the labels of all invocations so far, in call order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.state
            .invocations
            .lock()
            .iter()
            .map(|inv| inv.label.clone())
            .collect()
    }

    /// Returns the number of invocations so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.invocations.lock().len()
    }

    /// Returns `true` if nothing has been invoked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets all recorded invocations.
    pub fn clear(&self) {
        self.state.invocations.lock().clear();
    }

    /// Returns the highest number of invocations that were ever in flight
    /// at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even if the invocation is dropped.
struct InFlightGuard<'a>(&'a RecorderState);

impl<'a> InFlightGuard<'a> {
    fn enter(state: &'a RecorderState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StageRunner for RecordingRunner {
    async fn run(&self, command: &[String], label: &str) -> Result<(), StageError> {
        self.state.invocations.lock().push(Invocation {
            label: label.to_owned(),
            command: command.to_vec(),
        });

        let _guard = InFlightGuard::enter(&self.state);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.state.failing.load(Ordering::SeqCst) {
            return Err(StageError::ExitCode {
                label: label.to_owned(),
                code: 1,
            });
        }
        Ok(())
    }
}
