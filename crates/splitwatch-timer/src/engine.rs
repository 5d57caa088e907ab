//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use splitwatch_common::{SharedClock, TimerConfig};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::scheduling::RateLimiter;
use crate::sink::ElapsedSink;
use crate::state::{TimerControls, TimerPhase, TimerSnapshot, TimerState};
use crate::{Result, TimerError};

const LOG_TARGET: &str = "splitwatch::timer";

struct EngineInner {
    state: TimerState,
    ticker: Option<CancellationToken>,
}

struct EngineShared {
    inner: Mutex<EngineInner>,
    clock: SharedClock,
    sink: Box<dyn ElapsedSink>,
}

impl EngineShared {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Stopwatch that owns its state and its periodic tick task.
///
/// Transitions are serialised by one lock; the tick task takes the same lock
/// and publishes only while its run segment is still current, so nothing is
/// published after [`TimerEngine::stop`] returns. Dropping the engine cancels
/// the tick task.
pub struct TimerEngine {
    shared: Arc<EngineShared>,
    handle: Handle,
    tick_interval: Duration,
}

impl TimerEngine {
    /// Engine publishing to `sink` every `tick_interval` while running.
    ///
    /// Must be called inside a Tokio runtime; the tick task is spawned on it.
    pub fn new(
        clock: SharedClock,
        tick_interval: Duration,
        sink: impl ElapsedSink,
    ) -> Result<Self> {
        if tick_interval.is_zero() {
            return Err(TimerError::InvalidTickInterval);
        }
        let handle = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        Ok(Self {
            shared: Arc::new(EngineShared {
                inner: Mutex::new(EngineInner {
                    state: TimerState::new(),
                    ticker: None,
                }),
                clock,
                sink: Box::new(sink),
            }),
            handle,
            tick_interval,
        })
    }

    /// Engine using the configured tick cadence.
    pub fn from_config(
        clock: SharedClock,
        config: &TimerConfig,
        sink: impl ElapsedSink,
    ) -> Result<Self> {
        Self::new(clock, config.tick_interval, sink)
    }

    /// Start from idle or resume from stopped. Ignored while running.
    pub fn start(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        let now = self.shared.now_ms();
        if !inner.state.start(now) {
            return false;
        }
        let cancel = CancellationToken::new();
        if let Some(previous) = inner.ticker.replace(cancel.clone()) {
            previous.cancel();
        }
        self.handle.spawn(run_ticks(
            self.shared.clone(),
            inner.state.segment(),
            self.tick_interval,
            cancel,
        ));
        let elapsed = inner.state.elapsed_ms();
        self.shared.sink.publish(elapsed);
        tracing::debug!(target: LOG_TARGET, elapsed_ms = elapsed, "timer started");
        true
    }

    /// Freeze elapsed and cancel the tick task. Ignored unless running.
    pub fn stop(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        let now = self.shared.now_ms();
        if !inner.state.stop(now) {
            return false;
        }
        if let Some(ticker) = inner.ticker.take() {
            ticker.cancel();
        }
        let elapsed = inner.state.elapsed_ms();
        self.shared.sink.publish(elapsed);
        tracing::debug!(target: LOG_TARGET, elapsed_ms = elapsed, "timer stopped");
        true
    }

    /// Clear a stopped timer back to zero. Ignored while running or idle.
    pub fn reset(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        if !inner.state.reset() {
            if inner.state.phase() == TimerPhase::Running {
                tracing::debug!(target: LOG_TARGET, "reset ignored while running");
            }
            return false;
        }
        self.shared.sink.publish(0);
        true
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.shared.inner.lock().state.phase()
    }

    /// Elapsed milliseconds as of now.
    pub fn elapsed_ms(&self) -> u64 {
        self.snapshot().elapsed_ms
    }

    /// Phase and elapsed read under one lock.
    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.shared.inner.lock();
        inner.state.snapshot(self.shared.now_ms())
    }

    /// Which controls are currently applicable.
    pub fn controls(&self) -> TimerControls {
        self.shared.inner.lock().state.controls()
    }

    /// True while a tick task is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.shared.inner.lock().ticker.is_some()
    }

    /// Cancel the tick task; the engine keeps its state but stops publishing.
    pub fn shutdown(&self) {
        if let Some(ticker) = self.shared.inner.lock().ticker.take() {
            ticker.cancel();
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_ticks(
    shared: Arc<EngineShared>,
    segment: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut limiter = RateLimiter::new(period);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = limiter.tick() => {}
        }
        let mut inner = shared.inner.lock();
        if cancel.is_cancelled()
            || inner.state.segment() != segment
            || inner.state.phase() != TimerPhase::Running
        {
            break;
        }
        let elapsed = inner.state.refresh(shared.now_ms());
        shared.sink.publish(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{NullSink, WatchSink};
    use splitwatch_common::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manual_engine(sink: impl ElapsedSink) -> (TimerEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let engine = TimerEngine::new(clock.clone(), Duration::from_millis(10), sink).unwrap();
        (engine, clock)
    }

    #[test]
    fn construction_requires_runtime() {
        let clock = Arc::new(ManualClock::new(0));
        let result = TimerEngine::new(clock, Duration::from_millis(10), NullSink);
        assert!(matches!(result, Err(TimerError::NoRuntime)));
    }

    #[tokio::test]
    async fn zero_tick_interval_is_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let result = TimerEngine::new(clock, Duration::ZERO, NullSink);
        assert!(matches!(result, Err(TimerError::InvalidTickInterval)));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_publish_anchor_relative_elapsed() {
        let (sink, mut receiver) = WatchSink::channel();
        let (engine, clock) = manual_engine(sink);
        assert!(engine.start());
        assert!(engine.is_ticking());
        assert_eq!(*receiver.borrow_and_update(), 0);

        // A slow scheduler: 37 ms of clock time passes before the tick fires.
        clock.advance_ms(37);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), 37);
        assert_eq!(engine.elapsed_ms(), 37);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_and_silences_the_ticker() {
        let published = Arc::new(AtomicUsize::new(0));
        let counter = published.clone();
        let (engine, clock) = manual_engine(move |_elapsed| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine.start();
        clock.advance_ms(55);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(engine.stop());
        assert_eq!(engine.phase(), TimerPhase::Stopped);
        assert_eq!(engine.elapsed_ms(), 55);
        assert!(!engine.is_ticking());

        let after_stop = published.load(Ordering::SeqCst);
        clock.advance_ms(1_000);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(published.load(Ordering::SeqCst), after_stop);
        assert_eq!(engine.elapsed_ms(), 55);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_continues_from_frozen_value() {
        let (engine, clock) = manual_engine(NullSink);
        engine.start();
        clock.advance_ms(1_000);
        engine.stop();

        clock.advance_ms(60_000);
        engine.start();
        clock.advance_ms(250);
        assert_eq!(engine.elapsed_ms(), 1_250);
        engine.stop();
        assert_eq!(engine.elapsed_ms(), 1_250);
    }

    #[tokio::test]
    async fn guards_make_invalid_transitions_no_ops() {
        let (engine, clock) = manual_engine(NullSink);
        assert!(!engine.stop());
        assert!(!engine.reset());

        engine.start();
        clock.advance_ms(200);
        assert!(!engine.start());
        assert!(!engine.reset());
        assert_eq!(engine.phase(), TimerPhase::Running);
        assert_eq!(engine.elapsed_ms(), 200);

        engine.stop();
        assert!(engine.controls().can_reset);
        assert!(engine.reset());
        assert_eq!(engine.snapshot(), TimerSnapshot { phase: TimerPhase::Idle, elapsed_ms: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_tick_task() {
        let published = Arc::new(AtomicUsize::new(0));
        let counter = published.clone();
        let (engine, clock) = manual_engine(move |_elapsed| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        engine.start();
        drop(engine);
        let before = published.load(Ordering::SeqCst);
        clock.advance_ms(500);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(published.load(Ordering::SeqCst), before);
    }
}
