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

use prometheus::{IntCounterVec, IntGauge, Opts};
use splitwatch_metrics::SharedRegistry;

use crate::store::Operation;
use crate::Result;

/// Why a call was served by the fallback store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No primary connection is established.
    Absent,
    /// The primary is inside its unhealthy cool-down window.
    Cooldown,
    /// The primary call failed with a transport-class error.
    Transport,
}

impl FallbackReason {
    /// Static label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Absent => "absent",
            FallbackReason::Cooldown => "cooldown",
            FallbackReason::Transport => "transport",
        }
    }
}

/// Metrics published by the store router and connect loop.
#[derive(Clone)]
pub struct StoreMetrics {
    registry: SharedRegistry,
    calls_total: IntCounterVec,
    fallbacks_total: IntCounterVec,
    primary_connected: IntGauge,
    connect_attempts_total: IntCounterVec,
}

impl fmt::Debug for StoreMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreMetrics")
            .field("primary_connected", &self.primary_connected.get())
            .finish_non_exhaustive()
    }
}

impl StoreMetrics {
    /// Register the store metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let calls_total = IntCounterVec::new(
            Opts::new(
                "splitwatch_store_calls_total",
                "Store calls completed, labelled by the backend that served them",
            ),
            &["backend", "operation"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let fallbacks_total = IntCounterVec::new(
            Opts::new(
                "splitwatch_store_fallbacks_total",
                "Store calls routed to the in-memory fallback",
            ),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let primary_connected = IntGauge::new(
            "splitwatch_store_primary_connected",
            "1 while a healthy primary store connection is attached",
        )?;
        registry.register(Box::new(primary_connected.clone()))?;

        let connect_attempts_total = IntCounterVec::new(
            Opts::new(
                "splitwatch_store_connect_attempts_total",
                "Primary store connection attempts by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(connect_attempts_total.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            fallbacks_total,
            primary_connected,
            connect_attempts_total,
        })
    }

    /// Access the registry backing these metrics.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub(crate) fn record_call(&self, backend: &str, operation: Operation) {
        self.calls_total
            .with_label_values(&[backend, operation.as_str()])
            .inc();
    }

    pub(crate) fn record_fallback(&self, operation: Operation, reason: FallbackReason) {
        self.fallbacks_total
            .with_label_values(&[operation.as_str(), reason.as_str()])
            .inc();
    }

    pub(crate) fn set_primary_connected(&self, connected: bool) {
        self.primary_connected.set(i64::from(connected));
    }

    pub(crate) fn record_connect_attempt(&self, outcome: &str) {
        self.connect_attempts_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Calls served by `backend` for `operation` so far.
    pub fn calls(&self, backend: &str, operation: Operation) -> u64 {
        self.calls_total
            .with_label_values(&[backend, operation.as_str()])
            .get()
    }

    /// Fallback count for `operation` and `reason` so far.
    pub fn fallbacks(&self, operation: Operation, reason: FallbackReason) -> u64 {
        self.fallbacks_total
            .with_label_values(&[operation.as_str(), reason.as_str()])
            .get()
    }

    #[cfg(test)]
    pub(crate) fn connect_attempts(&self, outcome: &str) -> u64 {
        self.connect_attempts_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Current value of the primary connection gauge.
    pub fn primary_connected(&self) -> bool {
        self.primary_connected.get() == 1
    }
}
