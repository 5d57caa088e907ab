//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "HTTP client for the timing record API."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::time::Duration;

use crate::error::ClientError;

/// Whether a request reads or mutates records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Safe to repeat.
    Query,
    /// May duplicate side effects when repeated.
    Mutation,
}

/// Bounded retry of network-class failures. Responses carrying any HTTP
/// status are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Queries are retried while the failure count is below this.
    pub query_retries: u32,
    /// Mutations are retried while the failure count is below this.
    pub mutation_retries: u32,
    /// Delay before the first retry; doubles for each further one.
    pub base_delay: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            query_retries: 3,
            mutation_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn never() -> Self {
        Self {
            query_retries: 0,
            mutation_retries: 0,
            ..Self::default()
        }
    }

    /// Decide whether to retry after `failure_count` earlier retries.
    pub fn should_retry(&self, kind: RequestKind, failure_count: u32, error: &ClientError) -> bool {
        let limit = match kind {
            RequestKind::Query => self.query_retries,
            RequestKind::Mutation => self.mutation_retries,
        };
        error.is_network() && failure_count < limit
    }

    /// Delay before retry number `failure_count` (zero-based).
    pub fn delay_for(&self, failure_count: u32) -> Duration {
        let factor = 1u32.checked_shl(failure_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
