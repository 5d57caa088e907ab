//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use tokio::sync::watch;

/// The single display subscriber of a [`crate::TimerEngine`].
///
/// `publish` runs while the engine holds its state lock, so implementations
/// must return quickly and must not call back into the engine.
pub trait ElapsedSink: Send + Sync + 'static {
    /// Receive the current elapsed milliseconds.
    fn publish(&self, elapsed_ms: u64);
}

impl<F> ElapsedSink for F
where
    F: Fn(u64) + Send + Sync + 'static,
{
    fn publish(&self, elapsed_ms: u64) {
        self(elapsed_ms)
    }
}

/// Sink that forwards each value into a [`watch`] channel.
#[derive(Debug)]
pub struct WatchSink {
    sender: watch::Sender<u64>,
}

impl WatchSink {
    /// Sink plus the receiver a display task reads from.
    pub fn channel() -> (Self, watch::Receiver<u64>) {
        let (sender, receiver) = watch::channel(0);
        (Self { sender }, receiver)
    }
}

impl ElapsedSink for WatchSink {
    fn publish(&self, elapsed_ms: u64) {
        self.sender.send_replace(elapsed_ms);
    }
}

/// Sink that discards every value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ElapsedSink for NullSink {
    fn publish(&self, _elapsed_ms: u64) {}
}
