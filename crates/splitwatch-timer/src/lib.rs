//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Stopwatch engine for splitwatch.
//!
//! [`TimerEngine`] derives elapsed time from an anchored monotonic reading and
//! drives a single [`ElapsedSink`] from a cancellable tick task.
//! [`StopwatchSession`] adds the save action that persists a stopped value.

use splitwatch_store::StoreError;

pub mod engine;
pub mod scheduling;
pub mod session;
pub mod sink;
pub mod state;

pub use engine::TimerEngine;
pub use scheduling::RateLimiter;
pub use session::StopwatchSession;
pub use sink::{ElapsedSink, NullSink, WatchSink};
pub use state::{TimerControls, TimerPhase, TimerSnapshot, TimerState};

/// Result alias for timer operations.
pub type Result<T> = std::result::Result<T, TimerError>;

/// Errors raised by the timer crate.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The engine was built outside a Tokio runtime.
    #[error("timer engine requires a running Tokio runtime")]
    NoRuntime,
    /// A zero tick cadence would spin.
    #[error("tick interval must be greater than zero")]
    InvalidTickInterval,
    /// Saving requires a stopped timer.
    #[error("stop the timer before saving")]
    StillRunning,
    /// Nothing has been timed since the last reset.
    #[error("no elapsed time to save")]
    NothingToSave,
    /// The record store rejected or failed the save.
    #[error(transparent)]
    Store(#[from] StoreError),
}
