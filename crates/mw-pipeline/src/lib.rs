//! Debounced extract/validate/index pipeline for minerva-watch.
//!
//! The crate turns a stream of change events into pipeline runs, one per
//! burst of changes:
//!
//! - [`Pipeline`] is the fixed stage list: `extractor`, optional
//!   `validator`, `indexer`.
//! - [`StageRunner`] executes one stage. [`CommandRunner`] spawns processes,
//!   [`DryRunRunner`] only logs them, and [`RecordingRunner`] records them
//!   for tests.
//! - [`Scheduler`] is the synchronous debounce and recovery state machine.
//! - [`Orchestrator`] is the async task driving all of the above from a
//!   [`ChangeSource`](mw_watcher::ChangeSource).
//!
//! At most one run attempt executes at a time. Changes that arrive during a
//! run are queued for the next one. After a failed stage, nothing runs again
//! until a fresh change arrives.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod schedule;
pub mod stage;

pub use error::StageError;
pub use orchestrator::{
    Orchestrator, OrchestratorOptions, OrchestratorStats, RunOutcome, RunReport,
};
pub use runner::{
    CommandRunner, DRY_RUN_DELAY, DryRunRunner, Invocation, RecordingRunner, StageRunner,
    format_command,
};
pub use schedule::{ExecutionState, PipelineRunAttempt, Scheduler};
pub use stage::{Pipeline, PipelineStage, StageKind};
