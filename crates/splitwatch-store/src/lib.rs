//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Timing record persistence.
//!
//! [`RecordStore`] is the uniform contract. [`PrimaryStore`] (SQLite) and
//! [`PostgresStore`] keep records in a relational database, [`FallbackStore`] keeps them in process memory, and
//! [`StoreRouter`] picks between the two on every call so callers never see a
//! transport failure of the primary.

use std::time::Duration;

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for the record store subsystem.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Caller supplied a record that violates the record contract.
    #[error("invalid record: {}", .0.summary())]
    Validation(ValidationErrors),
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The database rejected or failed a statement.
    #[error("database error: {0}")]
    Database(String),
    /// A store call exceeded its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// A persisted row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// The connection string or store setup is unusable; retrying will not help.
    #[error("store configuration error: {0}")]
    Configuration(String),
    /// Wrapper for Prometheus metrics registration failures.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl StoreError {
    /// True for failures of the transport or database that a different backend
    /// could absorb.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Database(_) | StoreError::Timeout(_)
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.as_db_error().is_some() {
            StoreError::Database(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

pub mod context;
pub mod health;
pub mod memory;
pub mod metrics;
pub mod primary;
pub mod record;
pub mod router;
pub mod store;

pub use context::{connector_for, ConnectBackoff, StoreContext};
pub use health::{HealthTracker, StoreHealth};
pub use memory::FallbackStore;
pub use metrics::{FallbackReason, StoreMetrics};
pub use primary::{
    is_postgres_url, DatabaseUrl, PostgresConnector, PostgresStore, PrimaryStore, SqliteConnector,
};
pub use record::{NewTimingRecord, TimingRecord, ValidationErrors, MAX_DURATION_MS};
pub use router::{RouterSettings, StoreRouter, FALLBACK_ID_BASE};
pub use store::{Operation, PrimaryConnector, RecordStore, SharedStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(StoreError::Unavailable("down".into()).is_transport());
        assert!(StoreError::Database("locked".into()).is_transport());
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!StoreError::Corrupt("bad timestamp".into()).is_transport());
        assert!(!StoreError::Configuration("scheme".into()).is_transport());
        let invalid = ValidationErrors::single("duration", "must be non-negative");
        assert!(!StoreError::Validation(invalid).is_transport());
    }

    #[test]
    fn validation_display_lists_fields() {
        let err = StoreError::Validation(ValidationErrors::single(
            "duration",
            "must be non-negative",
        ));
        assert_eq!(
            err.to_string(),
            "invalid record: duration: must be non-negative"
        );
    }
}
