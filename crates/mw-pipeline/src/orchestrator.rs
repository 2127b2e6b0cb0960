//! The orchestrator task.
//!
//! [`Orchestrator::run`] is a single task that owns the [`Scheduler`] and
//! multiplexes four event sources with `tokio::select!`:
//!
//! ```text
//!   shutdown token ───────┐
//!   in-flight attempt ────┤
//!   ChangeSource::recv ───┼──► select! ──► Scheduler transitions ──► launch attempt
//!   debounce deadline ────┘
//! ```
//!
//! Because every transition happens on this one task, there is never more
//! than one attempt future in flight, and changes keep being accepted while
//! an attempt runs.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, OptionFuture};
use mw_core::WatchConfig;
use mw_watcher::{ChangeEvent, ChangeSource, ExtensionFilter, FileFilter, WatchError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::runner::StageRunner;
use crate::schedule::{ExecutionState, PipelineRunAttempt, Scheduler};
use crate::stage::{Pipeline, StageKind};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Quiescence window before a run is requested.
    pub debounce: Duration,
    /// Extension allow-list applied to every incoming change.
    pub filter: ExtensionFilter,
    /// Log each accepted change at `info` instead of `debug`.
    pub log_changed_files: bool,
}

impl OrchestratorOptions {
    /// Creates options with the given window and extension filter.
    #[must_use]
    pub const fn new(debounce: Duration, filter: ExtensionFilter) -> Self {
        Self {
            debounce,
            filter,
            log_changed_files: false,
        }
    }

    /// Derives options from the watch section of the configuration.
    #[must_use]
    pub fn from_watch_config(watch: &WatchConfig) -> Self {
        Self {
            debounce: watch.debounce(),
            filter: ExtensionFilter::new(&watch.include_extensions),
            log_changed_files: watch.log_changed_files,
        }
    }
}

/// How a run attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage exited with code zero.
    Succeeded,
    /// A stage failed and the remaining stages were skipped.
    Failed {
        /// The stage that failed.
        stage: StageKind,
        /// Human-readable failure reason.
        reason: String,
    },
}

impl RunOutcome {
    /// Returns `true` for [`RunOutcome::Succeeded`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Summary of one finished run attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Attempt sequence number.
    pub attempt: u64,
    /// The changed paths the attempt ran for.
    pub paths: Vec<Utf8PathBuf>,
    /// Success, or which stage failed and why.
    pub outcome: RunOutcome,
    /// Wall time from the first stage start to the last stage end.
    pub elapsed: Duration,
}

/// Counters returned when the orchestrator stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Changes that passed the extension filter.
    pub changes_accepted: u64,
    /// Changes discarded by the extension filter.
    pub changes_ignored: u64,
    /// Attempts launched.
    pub runs_started: u64,
    /// Attempts where every stage succeeded.
    pub runs_succeeded: u64,
    /// Attempts that ended with a failed stage.
    pub runs_failed: u64,
    /// Attempts dropped mid-flight by shutdown.
    pub runs_interrupted: u64,
}

/// The attempt currently executing.
struct InFlight {
    attempt: u64,
    future: BoxFuture<'static, RunReport>,
}

/// Drives the pipeline in response to change events.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use mw_pipeline::{Orchestrator, OrchestratorOptions, Pipeline, RecordingRunner};
/// use mw_watcher::{ChangeEvent, ChangeKind, ExtensionFilter};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = RecordingRunner::new();
/// let pipeline = Pipeline::new(vec!["extract".into()], None, vec!["index".into()]);
/// let options = OrchestratorOptions::new(Duration::from_millis(10), ExtensionFilter::new([".md"]));
///
/// let mut orchestrator = Orchestrator::new(pipeline, runner.clone(), options);
/// let mut reports = orchestrator.subscribe();
///
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// let shutdown = CancellationToken::new();
/// let task = tokio::spawn(orchestrator.run(rx, shutdown.clone()));
///
/// tx.send(ChangeEvent::new("/docs/a.md", ChangeKind::Change)).await.unwrap();
/// let report = reports.recv().await.unwrap();
/// assert!(report.outcome.is_success());
/// assert_eq!(runner.labels(), ["extractor", "indexer"]);
///
/// shutdown.cancel();
/// let stats = task.await.unwrap().unwrap();
/// assert_eq!(stats.runs_succeeded, 1);
/// # }
/// ```
pub struct Orchestrator<R> {
    pipeline: Arc<Pipeline>,
    runner: Arc<R>,
    options: OrchestratorOptions,
    scheduler: Scheduler,
    stats: OrchestratorStats,
    reports: Option<mpsc::UnboundedSender<RunReport>>,
}

impl<R> std::fmt::Debug for Orchestrator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.pipeline)
            .field("options", &self.options)
            .field("scheduler", &self.scheduler)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: StageRunner> Orchestrator<R> {
    /// Creates an idle orchestrator.
    pub fn new(pipeline: Pipeline, runner: R, options: OrchestratorOptions) -> Self {
        let scheduler = Scheduler::new(options.debounce);
        Self {
            pipeline: Arc::new(pipeline),
            runner: Arc::new(runner),
            options,
            scheduler,
            stats: OrchestratorStats::default(),
            reports: None,
        }
    }

    /// Returns a receiver that gets a [`RunReport`] for every finished
    /// attempt. A later call replaces the earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RunReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reports = Some(tx);
        rx
    }

    /// Returns the current phase.
    pub const fn state(&self) -> ExecutionState {
        self.scheduler.state()
    }

    /// Returns the counters so far.
    pub const fn stats(&self) -> OrchestratorStats {
        self.stats
    }

    /// Applies the extension filter and records an accepted change.
    ///
    /// Returns whether the change was accepted. Rejected changes leave all
    /// state untouched apart from the ignored counter.
    pub fn handle_change(&mut self, event: ChangeEvent) -> bool {
        if !self.options.filter.should_process(&event.path) {
            self.stats.changes_ignored += 1;
            tracing::trace!(path = %event.path, kind = %event.kind, "Change ignored by extension filter");
            return false;
        }

        if self.options.log_changed_files {
            tracing::info!(path = %event.path, kind = %event.kind, "Change detected");
        } else {
            tracing::debug!(path = %event.path, kind = %event.kind, "Change detected");
        }

        if self.scheduler.state() == ExecutionState::AwaitingRecovery {
            tracing::info!("New change received, leaving recovery wait");
        }

        self.stats.changes_accepted += 1;
        self.scheduler.record_change(event.path, Instant::now());
        true
    }

    /// Runs until `shutdown` is cancelled or `source` ends, then closes the
    /// source.
    ///
    /// An attempt still executing at that point is dropped, which kills its
    /// child process.
    ///
    /// # Errors
    ///
    /// Returns the error from closing the change source.
    pub async fn run<S: ChangeSource>(
        mut self,
        mut source: S,
        shutdown: CancellationToken,
    ) -> Result<OrchestratorStats, WatchError> {
        let mut in_flight: Option<InFlight> = None;

        tracing::info!(
            debounce_ms = millis(self.options.debounce),
            stages = self.pipeline.len(),
            extensions = ?self.options.filter.extensions(),
            "Orchestrator started"
        );

        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested");
                    self.interrupt(in_flight.take());
                    break;
                }

                Some(report) = OptionFuture::from(in_flight.as_mut().map(|run| &mut run.future)),
                    if in_flight.is_some() =>
                {
                    in_flight = None;
                    let succeeded = report.outcome.is_success();
                    self.finish(report);
                    if let Some(next) = self.scheduler.attempt_finished(succeeded) {
                        tracing::info!(
                            attempt = next.number,
                            files = next.paths.len(),
                            "Changes arrived during the run, starting another"
                        );
                        in_flight = Some(self.launch(next));
                    }
                }

                event = source.recv() => {
                    if let Some(event) = event {
                        self.handle_change(event);
                    } else {
                        tracing::warn!("Change source ended, stopping orchestrator");
                        self.interrupt(in_flight.take());
                        break;
                    }
                }

                () = sleep_until_deadline(deadline), if deadline.is_some() => {
                    if let Some(attempt) = self.scheduler.timer_elapsed() {
                        in_flight = Some(self.launch(attempt));
                    } else if self.scheduler.state() == ExecutionState::Running {
                        tracing::debug!("Debounce elapsed during a run, deferring to its completion");
                    }
                }
            }
        }

        source.close().await?;
        tracing::info!(
            runs_started = self.stats.runs_started,
            runs_succeeded = self.stats.runs_succeeded,
            runs_failed = self.stats.runs_failed,
            "Orchestrator stopped"
        );
        Ok(self.stats)
    }

    fn launch(&mut self, attempt: PipelineRunAttempt) -> InFlight {
        self.stats.runs_started += 1;
        InFlight {
            attempt: attempt.number,
            future: execute_attempt(Arc::clone(&self.runner), Arc::clone(&self.pipeline), attempt)
                .boxed(),
        }
    }

    fn finish(&mut self, report: RunReport) {
        match &report.outcome {
            RunOutcome::Succeeded => {
                self.stats.runs_succeeded += 1;
                tracing::info!(
                    attempt = report.attempt,
                    files = report.paths.len(),
                    elapsed_ms = millis(report.elapsed),
                    "Pipeline run completed"
                );
            }
            RunOutcome::Failed { stage, reason } => {
                self.stats.runs_failed += 1;
                tracing::error!(
                    attempt = report.attempt,
                    stage = %stage,
                    reason = %reason,
                    "Pipeline run failed, waiting for a new change before running again"
                );
            }
        }

        if let Some(tx) = &self.reports {
            if tx.send(report).is_err() {
                self.reports = None;
            }
        }
    }

    fn interrupt(&mut self, in_flight: Option<InFlight>) {
        if let Some(run) = in_flight {
            self.stats.runs_interrupted += 1;
            tracing::warn!(
                attempt = run.attempt,
                "Run attempt interrupted by shutdown, remaining stages skipped"
            );
            drop(run);
        }
    }
}

/// Runs every stage of `pipeline` in order, stopping at the first failure.
async fn execute_attempt<R: StageRunner>(
    runner: Arc<R>,
    pipeline: Arc<Pipeline>,
    attempt: PipelineRunAttempt,
) -> RunReport {
    let started = Instant::now();
    tracing::info!(
        attempt = attempt.number,
        files = attempt.paths.len(),
        "Pipeline run started"
    );

    let mut outcome = RunOutcome::Succeeded;
    for stage in pipeline.stages() {
        let stage_started = Instant::now();
        tracing::info!(attempt = attempt.number, stage = stage.label(), "Stage started");

        match runner.run(stage.command(), stage.label()).await {
            Ok(()) => {
                tracing::info!(
                    attempt = attempt.number,
                    stage = stage.label(),
                    elapsed_ms = millis(stage_started.elapsed()),
                    "Stage finished"
                );
            }
            Err(err) => {
                tracing::error!(
                    attempt = attempt.number,
                    stage = stage.label(),
                    exit_code = ?err.exit_code(),
                    elapsed_ms = millis(stage_started.elapsed()),
                    error = %err,
                    "Stage failed"
                );
                outcome = RunOutcome::Failed {
                    stage: stage.kind(),
                    reason: err.to_string(),
                };
                break;
            }
        }
    }

    RunReport {
        attempt: attempt.number,
        paths: attempt.paths,
        outcome,
        elapsed: started.elapsed(),
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
