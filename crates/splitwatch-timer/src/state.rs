//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::fmt;

/// Lifecycle phase of a stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    /// Elapsed is zero and no run segment exists.
    #[default]
    Idle,
    /// A run segment is anchored and elapsed advances.
    Running,
    /// Elapsed is frozen.
    Stopped,
}

impl TimerPhase {
    /// Static label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which controls make sense for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerControls {
    /// Start or resume.
    pub can_start: bool,
    /// Stop the running segment.
    pub can_stop: bool,
    /// Clear a stopped value back to zero.
    pub can_reset: bool,
}

/// Point-in-time view of a stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    /// Phase at the time of the snapshot.
    pub phase: TimerPhase,
    /// Elapsed milliseconds at the time of the snapshot.
    pub elapsed_ms: u64,
}

/// Clock-agnostic stopwatch state. Every transition takes the current
/// monotonic reading so elapsed is always `now - anchor`, never a sum of
/// tick deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerState {
    phase: TimerPhase,
    anchor_ms: Option<i64>,
    elapsed_ms: u64,
    segment: u64,
}

impl TimerState {
    /// Idle state with zero elapsed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// Last computed elapsed value.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Counter bumped on every start; identifies the current run segment.
    pub fn segment(&self) -> u64 {
        self.segment
    }

    /// Begin or resume a run segment. Ignored while already running.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.phase == TimerPhase::Running {
            return false;
        }
        self.anchor_ms = Some(to_signed(now_ms) - to_signed(self.elapsed_ms));
        self.phase = TimerPhase::Running;
        self.segment = self.segment.wrapping_add(1);
        true
    }

    /// Elapsed as of `now_ms` without mutating the state.
    pub fn elapsed_at(&self, now_ms: u64) -> u64 {
        match (self.phase, self.anchor_ms) {
            (TimerPhase::Running, Some(anchor)) => {
                let since_anchor = (to_signed(now_ms) - anchor).max(0) as u64;
                since_anchor.max(self.elapsed_ms)
            }
            _ => self.elapsed_ms,
        }
    }

    /// Recompute elapsed from the anchor when running; returns the value.
    pub fn refresh(&mut self, now_ms: u64) -> u64 {
        self.elapsed_ms = self.elapsed_at(now_ms);
        self.elapsed_ms
    }

    /// Freeze elapsed at `now_ms` and clear the anchor. Ignored unless running.
    pub fn stop(&mut self, now_ms: u64) -> bool {
        if self.phase != TimerPhase::Running {
            return false;
        }
        self.refresh(now_ms);
        self.anchor_ms = None;
        self.phase = TimerPhase::Stopped;
        true
    }

    /// Return to idle with zero elapsed. Ignored while running and when
    /// already idle.
    pub fn reset(&mut self) -> bool {
        if self.phase != TimerPhase::Stopped {
            return false;
        }
        self.elapsed_ms = 0;
        self.phase = TimerPhase::Idle;
        true
    }

    /// Control availability for the current state.
    pub fn controls(&self) -> TimerControls {
        let running = self.phase == TimerPhase::Running;
        TimerControls {
            can_start: !running,
            can_stop: running,
            can_reset: !running && self.elapsed_ms > 0,
        }
    }

    /// Phase plus elapsed as of `now_ms`.
    pub fn snapshot(&self, now_ms: u64) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            elapsed_ms: self.elapsed_at(now_ms),
        }
    }
}

fn to_signed(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
