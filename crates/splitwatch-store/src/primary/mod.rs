//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Durable record stores.
//!
//! The SQLite store lives here: a dedicated worker thread owns the
//! [`rusqlite::Connection`] and async callers submit closures over a channel,
//! awaiting the reply on a oneshot. The PostgreSQL store lives in
//! [`postgres`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::oneshot;

mod migrations;
pub mod postgres;

use migrations::run_migrations;

pub use postgres::{is_postgres_url, PostgresConnector, PostgresStore};

use crate::record::{insertion_timestamp, NewTimingRecord, TimingRecord};
use crate::store::{PrimaryConnector, RecordStore, SharedStore};
use crate::{Result, StoreError};

const LOG_TARGET: &str = "splitwatch::store::primary";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Parsed primary store connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// Private in-memory database, discarded when the worker stops.
    Memory,
    /// Database file on disk.
    File(PathBuf),
}

impl DatabaseUrl {
    /// Parse `sqlite://path`, `sqlite:path`, `file:path`, `sqlite::memory:` or a
    /// bare filesystem path. Other schemes are configuration errors.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Configuration(
                "database connection string is empty".into(),
            ));
        }
        if trimmed == ":memory:" || trimmed == "sqlite::memory:" {
            return Ok(DatabaseUrl::Memory);
        }

        let rest = if let Some(rest) = trimmed.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("sqlite:") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("file:") {
            rest.strip_prefix("//").unwrap_or(rest)
        } else if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(StoreError::Configuration(format!(
                "unsupported database scheme '{scheme}'"
            )));
        } else {
            trimmed
        };

        let path = rest.split_once('?').map_or(rest, |(path, _)| path);
        if path.is_empty() {
            return Err(StoreError::Configuration(format!(
                "database connection string '{trimmed}' names no file"
            )));
        }
        if path == ":memory:" {
            return Ok(DatabaseUrl::Memory);
        }
        Ok(DatabaseUrl::File(PathBuf::from(path)))
    }

    /// Filesystem path, when the database lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            DatabaseUrl::Memory => None,
            DatabaseUrl::File(path) => Some(path.as_path()),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseUrl::Memory => f.write_str("sqlite::memory:"),
            DatabaseUrl::File(path) => write!(f, "sqlite://{}", path.display()),
        }
    }
}

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct WorkerInner {
    sender: Mutex<Option<mpsc::Sender<DbCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerInner {
    fn stop(&self) {
        if let Some(sender) = self.sender.lock().take() {
            // The worker may already be gone; joining below still reaps it.
            let _ = sender.send(DbCommand::Shutdown);
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!(target: LOG_TARGET, "database worker panicked");
            }
        }
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Relational record store; clones share one worker thread.
#[derive(Clone)]
pub struct PrimaryStore {
    inner: Arc<WorkerInner>,
    url: Arc<DatabaseUrl>,
}

impl fmt::Debug for PrimaryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl PrimaryStore {
    /// Open the database, run migrations and start the worker thread.
    ///
    /// Blocks until the schema is ready; call from `spawn_blocking` inside a
    /// runtime.
    pub fn open(url: DatabaseUrl) -> Result<Self> {
        if let Some(parent) = url.path().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StoreError::Unavailable(format!(
                        "failed to create database directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_url = url.clone();

        let worker = thread::Builder::new()
            .name("splitwatch-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&thread_url) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(run_migrations(&mut conn)).is_err() {
                    return;
                }
                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }
                tracing::debug!(target: LOG_TARGET, "database worker stopped");
            })
            .map_err(|err| {
                StoreError::Unavailable(format!("failed to spawn database worker: {err}"))
            })?;

        let ready = ready_rx.recv().map_err(|_| {
            StoreError::Unavailable("database worker exited before signalling readiness".into())
        });
        if let Err(err) = ready.and_then(|outcome| outcome) {
            let _ = worker.join();
            return Err(err);
        }

        tracing::info!(target: LOG_TARGET, url = %url, "primary store opened");
        Ok(Self {
            inner: Arc::new(WorkerInner {
                sender: Mutex::new(Some(command_tx)),
                worker: Mutex::new(Some(worker)),
            }),
            url: Arc::new(url),
        })
    }

    /// Stop the worker thread. Later calls fail with
    /// [`StoreError::Unavailable`].
    pub fn close(&self) {
        self.inner.stop();
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = DbCommand::Execute(Box::new(move |conn| {
            let _ = reply_tx.send(task(conn));
        }));

        {
            let guard = self.inner.sender.lock();
            let sender = guard
                .as_ref()
                .ok_or_else(|| StoreError::Unavailable("primary store is closed".into()))?;
            sender
                .send(command)
                .map_err(|_| StoreError::Unavailable("database worker has stopped".into()))?;
        }

        reply_rx.await.map_err(|_| {
            StoreError::Unavailable("database worker terminated before replying".into())
        })?
    }
}

fn open_connection(url: &DatabaseUrl) -> Result<Connection> {
    let conn = match url {
        DatabaseUrl::Memory => Connection::open_in_memory()?,
        DatabaseUrl::File(path) => {
            let conn = Connection::open(path)
                .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;
            if let Err(err) =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
            {
                tracing::warn!(target: LOG_TARGET, error = %err, "failed to enable WAL mode");
            }
            conn
        }
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

struct RawRecord {
    id: i64,
    user_id: Option<i64>,
    title: Option<String>,
    duration: i64,
    created_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            duration: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<TimingRecord> {
        let duration_ms = u64::try_from(self.duration).map_err(|_| {
            StoreError::Corrupt(format!(
                "record {} has negative duration {}",
                self.id, self.duration
            ))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| {
                StoreError::Corrupt(format!(
                    "record {} has invalid created_at '{}': {err}",
                    self.id, self.created_at
                ))
            })?;
        Ok(TimingRecord {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            duration_ms,
            created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, title, duration, created_at FROM stopwatch_records";

#[async_trait]
impl RecordStore for PrimaryStore {
    fn backend(&self) -> &'static str {
        "primary"
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<TimingRecord>> {
        self.execute(move |conn| {
            let raw = match user_id {
                Some(uid) => {
                    let mut stmt = conn.prepare_cached(&format!(
                        "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY id ASC"
                    ))?;
                    let rows = stmt.query_map(params![uid], RawRecord::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare_cached(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
                    let rows = stmt.query_map([], RawRecord::from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            raw.into_iter().map(RawRecord::decode).collect()
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<TimingRecord>> {
        self.execute(move |conn| {
            let raw = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    RawRecord::from_row,
                )
                .optional()?;
            raw.map(RawRecord::decode).transpose()
        })
        .await
    }

    async fn create(&self, input: NewTimingRecord) -> Result<TimingRecord> {
        input.validate()?;
        self.execute(move |conn| {
            let created_at = insertion_timestamp();
            conn.execute(
                "INSERT INTO stopwatch_records (user_id, title, duration, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    input.user_id,
                    input.title,
                    input.duration_ms,
                    created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                ],
            )?;
            let id = conn.last_insert_rowid();
            input.into_record(id, created_at)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let removed = conn.execute("DELETE FROM stopwatch_records WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }
}

/// Opens [`PrimaryStore`] instances for a fixed connection string.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    url: DatabaseUrl,
}

impl SqliteConnector {
    /// Connector for an already parsed target.
    pub fn new(url: DatabaseUrl) -> Self {
        Self { url }
    }

    /// Parse the connection string up front so configuration errors surface
    /// before any connect attempt.
    pub fn from_connection_string(raw: &str) -> Result<Self> {
        DatabaseUrl::parse(raw).map(Self::new)
    }
}

#[async_trait]
impl PrimaryConnector for SqliteConnector {
    async fn connect(&self) -> Result<SharedStore> {
        let url = self.url.clone();
        let store = tokio::task::spawn_blocking(move || PrimaryStore::open(url))
            .await
            .map_err(|err| StoreError::Unavailable(format!("connect task failed: {err}")))??;
        Ok(Arc::new(store))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
