//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::metrics::StoreMetrics;

const LOG_TARGET: &str = "splitwatch::store::router";

/// Health of the primary store as seen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    /// No primary connection has been established, or it was detached.
    Absent,
    /// Primary attached and its last call succeeded.
    Healthy,
    /// Primary attached but its last call failed with a transport error.
    Unhealthy,
}

impl StoreHealth {
    /// Static label for logs and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreHealth::Absent => "absent",
            StoreHealth::Healthy => "healthy",
            StoreHealth::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for StoreHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct HealthState {
    health: StoreHealth,
    unhealthy_since: Option<Instant>,
}

/// Tracks primary health transitions, logging each one exactly once.
#[derive(Debug)]
pub struct HealthTracker {
    cooldown: Duration,
    state: Mutex<HealthState>,
    metrics: Option<StoreMetrics>,
}

impl HealthTracker {
    /// Tracker that starts [`StoreHealth::Absent`]. A zero `cooldown` lets the
    /// router retry an unhealthy primary on every call.
    pub fn new(cooldown: Duration, metrics: Option<StoreMetrics>) -> Self {
        Self {
            cooldown,
            state: Mutex::new(HealthState {
                health: StoreHealth::Absent,
                unhealthy_since: None,
            }),
            metrics,
        }
    }

    /// Most recently recorded health.
    pub fn current(&self) -> StoreHealth {
        self.state.lock().health
    }

    /// Whether the router should try the primary right now.
    pub fn should_attempt(&self) -> bool {
        let state = self.state.lock();
        match state.health {
            StoreHealth::Absent => false,
            StoreHealth::Healthy => true,
            StoreHealth::Unhealthy => state
                .unhealthy_since
                .map_or(true, |since| since.elapsed() >= self.cooldown),
        }
    }

    /// A primary was attached.
    pub fn mark_connected(&self) {
        self.transition(StoreHealth::Healthy, None);
    }

    /// The primary was detached.
    pub fn mark_absent(&self) {
        self.transition(StoreHealth::Absent, None);
    }

    /// A primary call succeeded.
    pub fn mark_success(&self) {
        self.transition(StoreHealth::Healthy, None);
    }

    /// A primary call failed with a transport-class error.
    pub fn mark_failure(&self, reason: &str) {
        self.transition(StoreHealth::Unhealthy, Some(reason));
    }

    fn transition(&self, next: StoreHealth, reason: Option<&str>) {
        let mut state = self.state.lock();
        if next == StoreHealth::Unhealthy {
            // Restart the cool-down on every failure, not only the first.
            state.unhealthy_since = Some(Instant::now());
        } else {
            state.unhealthy_since = None;
        }
        if state.health == next {
            return;
        }
        let previous = state.health;
        state.health = next;
        drop(state);

        if let Some(metrics) = &self.metrics {
            metrics.set_primary_connected(next == StoreHealth::Healthy);
        }
        match next {
            StoreHealth::Healthy => tracing::info!(
                target: LOG_TARGET,
                from = %previous,
                to = %next,
                "primary store available"
            ),
            StoreHealth::Unhealthy => tracing::warn!(
                target: LOG_TARGET,
                from = %previous,
                to = %next,
                reason = reason.unwrap_or("unknown"),
                cooldown_ms = self.cooldown.as_millis() as u64,
                "primary store degraded; serving from fallback"
            ),
            StoreHealth::Absent => tracing::warn!(
                target: LOG_TARGET,
                from = %previous,
                to = %next,
                "primary store detached; serving from fallback"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_absent_and_never_attempts() {
        let tracker = HealthTracker::new(Duration::ZERO, None);
        assert_eq!(tracker.current(), StoreHealth::Absent);
        assert!(!tracker.should_attempt());
    }

    #[test]
    fn zero_cooldown_retries_immediately() {
        let tracker = HealthTracker::new(Duration::ZERO, None);
        tracker.mark_connected();
        tracker.mark_failure("connection reset");
        assert_eq!(tracker.current(), StoreHealth::Unhealthy);
        assert!(tracker.should_attempt());
        tracker.mark_success();
        assert_eq!(tracker.current(), StoreHealth::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_suppresses_attempts_until_elapsed() {
        let tracker = HealthTracker::new(Duration::from_secs(2), None);
        tracker.mark_connected();
        tracker.mark_failure("timeout");
        assert!(!tracker.should_attempt());

        tokio::time::advance(Duration::from_millis(1_999)).await;
        assert!(!tracker.should_attempt());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(tracker.should_attempt());
    }

    #[test]
    fn gauge_follows_transitions() {
        let metrics = StoreMetrics::new(splitwatch_metrics::new_registry()).unwrap();
        let tracker = HealthTracker::new(Duration::ZERO, Some(metrics.clone()));
        tracker.mark_connected();
        assert!(metrics.primary_connected());
        tracker.mark_failure("refused");
        assert!(!metrics.primary_connected());
        tracker.mark_absent();
        assert!(!metrics.primary_connected());
    }
}
