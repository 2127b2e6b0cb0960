//! The run/recovery state machine, without any I/O.
//!
//! [`Scheduler`] owns the pending-change set, the single debounce deadline
//! and the execution phase. It never sleeps or spawns anything; the
//! orchestrator feeds it changes, timer expiries and run outcomes, and acts
//! on the [`PipelineRunAttempt`]s it hands back. Keeping it synchronous lets
//! every transition be tested without a runtime.
//!
//! ```text
//!            change                 deadline
//!   Idle ───────────────► Debouncing ────────► Running ──── ok, nothing pending ──► Idle
//!    ▲                       ▲   │ change        │  ▲
//!    │                       │   └───────────────┘  │ ok, more pending (loop)
//!    │                       │ change               │
//!    │                AwaitingRecovery ◄── failed ──┘
//! ```

use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use mw_core::{PathSet, drain_sorted, path_set};
use tokio::time::Instant;

/// The orchestrator's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// Nothing pending, nothing running.
    Idle,
    /// Changes are pending and the debounce deadline is armed.
    Debouncing,
    /// A run attempt is executing.
    Running,
    /// The last attempt failed; waiting for a fresh change.
    AwaitingRecovery,
}

impl ExecutionState {
    /// Returns the name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Debouncing => "debouncing",
            Self::Running => "running",
            Self::AwaitingRecovery => "awaiting-recovery",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pass through the stage list for one snapshot of pending paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRunAttempt {
    /// Sequence number, starting at 1.
    pub number: u64,
    /// The snapshot of pending paths this attempt was started for, sorted.
    pub paths: Vec<Utf8PathBuf>,
}

/// Debounce and run bookkeeping.
#[derive(Debug)]
pub struct Scheduler {
    state: ExecutionState,
    pending: PathSet,
    deadline: Option<Instant>,
    debounce: Duration,
    attempts: u64,
}

impl Scheduler {
    /// Creates an idle scheduler with the given quiescence window.
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: ExecutionState::Idle,
            pending: path_set(),
            deadline: None,
            debounce,
            attempts: 0,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// Returns when the debounce window ends, if armed.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the quiescence window.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Returns how many distinct paths are waiting for the next attempt.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of attempts started so far.
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Records an accepted change observed at `now`.
    ///
    /// The path joins the pending set and the deadline moves to
    /// `now + debounce`, replacing any earlier one. Outside of `Running`
    /// this also leaves `Idle` or `AwaitingRecovery` for `Debouncing`.
    pub fn record_change(&mut self, path: Utf8PathBuf, now: Instant) {
        self.pending.insert(path);
        self.deadline = Some(now + self.debounce);
        if self.state != ExecutionState::Running {
            self.state = ExecutionState::Debouncing;
        }
    }

    /// Handles expiry of the debounce deadline.
    ///
    /// Returns the attempt to execute, or `None` when the request is
    /// dropped: an attempt is already running (it re-checks pending work
    /// when it finishes), the scheduler is awaiting recovery, or nothing is
    /// pending.
    pub fn timer_elapsed(&mut self) -> Option<PipelineRunAttempt> {
        self.deadline = None;
        match self.state {
            ExecutionState::Running | ExecutionState::AwaitingRecovery => None,
            ExecutionState::Idle | ExecutionState::Debouncing => {
                if self.pending.is_empty() {
                    self.state = ExecutionState::Idle;
                    None
                } else {
                    Some(self.begin_attempt())
                }
            }
        }
    }

    /// Handles completion of the running attempt.
    ///
    /// On success, returns the next attempt straight away if changes arrived
    /// meanwhile, otherwise goes idle. On failure, discards everything
    /// pending and waits for a fresh change.
    pub fn attempt_finished(&mut self, succeeded: bool) -> Option<PipelineRunAttempt> {
        if !succeeded {
            self.pending.clear();
            self.deadline = None;
            self.state = ExecutionState::AwaitingRecovery;
            return None;
        }

        if self.pending.is_empty() {
            self.deadline = None;
            self.state = ExecutionState::Idle;
            None
        } else {
            Some(self.begin_attempt())
        }
    }

    /// Snapshot-then-clear: the attempt owns the drained paths and the
    /// deadline armed for them is disarmed.
    fn begin_attempt(&mut self) -> PipelineRunAttempt {
        self.state = ExecutionState::Running;
        self.deadline = None;
        self.attempts += 1;
        PipelineRunAttempt {
            number: self.attempts,
            paths: drain_sorted(&mut self.pending),
        }
    }
}
