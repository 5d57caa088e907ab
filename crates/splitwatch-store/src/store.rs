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
use std::sync::Arc;

use async_trait::async_trait;

use crate::record::{NewTimingRecord, TimingRecord};
use crate::Result;

/// Shared handle to any record store implementation.
pub type SharedStore = Arc<dyn RecordStore>;

/// Uniform create/list/get/delete contract over timing records.
///
/// Missing records are normal outcomes (`None` / `false`), never errors.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Short backend label used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// All records in ascending id order, or only those owned by `user_id`.
    async fn list(&self, user_id: Option<i64>) -> Result<Vec<TimingRecord>>;

    /// Fetch a single record.
    async fn get(&self, id: i64) -> Result<Option<TimingRecord>>;

    /// Validate and insert a record, assigning `id` and `created_at`.
    async fn create(&self, input: NewTimingRecord) -> Result<TimingRecord>;

    /// Remove a record; `false` when it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Establishes connections to the durable primary store.
#[async_trait]
pub trait PrimaryConnector: Send + Sync + 'static {
    /// Open a connection and return a ready-to-use store.
    async fn connect(&self) -> Result<SharedStore>;

    /// Redacted description of the target for logs.
    fn describe(&self) -> String;
}

/// Store operations, used as log and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`RecordStore::list`].
    List,
    /// [`RecordStore::get`].
    Get,
    /// [`RecordStore::create`].
    Create,
    /// [`RecordStore::delete`].
    Delete,
}

impl Operation {
    /// Static label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
