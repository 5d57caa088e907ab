//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Process-wide store lifecycle: build the router, probe the primary in the
//! background, tear both down on shutdown.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use splitwatch_common::StoreConfig;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::StoreMetrics;
use crate::primary::{is_postgres_url, PostgresConnector, SqliteConnector};
use crate::router::{RouterSettings, StoreRouter};
use crate::store::{PrimaryConnector, RecordStore, SharedStore};
use crate::{Result, StoreError};

const LOG_TARGET: &str = "splitwatch::store::context";

/// Exponential backoff bounds for the primary connect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectBackoff {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Upper bound on the delay between attempts.
    pub max: Duration,
    /// Failures tolerated before giving up; zero keeps trying.
    pub attempts: u32,
}

impl ConnectBackoff {
    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Connector for a primary connection string: PostgreSQL for `postgres://`
/// and `postgresql://`, SQLite for everything else.
pub fn connector_for(raw: &str) -> Result<Arc<dyn PrimaryConnector>> {
    if is_postgres_url(raw) {
        Ok(Arc::new(PostgresConnector::from_connection_string(raw)?))
    } else {
        Ok(Arc::new(SqliteConnector::from_connection_string(raw)?))
    }
}

impl From<&StoreConfig> for ConnectBackoff {
    fn from(config: &StoreConfig) -> Self {
        Self {
            initial: config.connect_retry_initial,
            max: config.connect_retry_max,
            attempts: config.connect_attempts,
        }
    }
}

/// Owns the [`StoreRouter`] handed to request handlers and the background
/// task that connects its primary.
pub struct StoreContext {
    router: Arc<StoreRouter>,
    cancel: CancellationToken,
    probe: Mutex<Option<JoinHandle<()>>>,
}

impl StoreContext {
    /// Build the router from configuration and start probing the primary.
    ///
    /// A missing or unusable connection string leaves the context in
    /// fallback-only mode; it is logged, never fatal. Fails only when called
    /// outside a Tokio runtime.
    pub fn start(config: &StoreConfig, metrics: Option<StoreMetrics>) -> Result<Self> {
        let Some(raw) = config.resolve_database_url() else {
            tracing::warn!(
                target: LOG_TARGET,
                env = %config.database_url_env,
                "no primary store connection string configured; records will not survive restart"
            );
            return Ok(Self::fallback_only(config, metrics));
        };

        match connector_for(&raw) {
            Ok(connector) => Self::with_connector(config, connector, metrics),
            Err(err) => {
                tracing::error!(
                    target: LOG_TARGET,
                    error = %err,
                    "primary store connection string rejected; records will not survive restart"
                );
                Ok(Self::fallback_only(config, metrics))
            }
        }
    }

    /// Context that never attempts a primary connection.
    pub fn fallback_only(config: &StoreConfig, metrics: Option<StoreMetrics>) -> Self {
        Self {
            router: Arc::new(StoreRouter::new(RouterSettings::from(config), metrics)),
            cancel: CancellationToken::new(),
            probe: Mutex::new(None),
        }
    }

    /// Context whose primary is opened by `connector` on a background task.
    pub fn with_connector(
        config: &StoreConfig,
        connector: Arc<dyn PrimaryConnector>,
        metrics: Option<StoreMetrics>,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| {
            StoreError::Configuration("store context requires a running Tokio runtime".into())
        })?;
        let context = Self::fallback_only(config, metrics.clone());
        let task = handle.spawn(connect_loop(
            connector,
            context.router.clone(),
            ConnectBackoff::from(config),
            context.cancel.clone(),
            metrics,
        ));
        *context.probe.lock() = Some(task);
        Ok(context)
    }

    /// Router to hand to request handlers.
    pub fn router(&self) -> Arc<StoreRouter> {
        self.router.clone()
    }

    /// The router as a type-erased [`SharedStore`].
    pub fn store(&self) -> SharedStore {
        self.router.clone()
    }

    /// Wait until the background connect loop has finished, successfully or
    /// not. Returns immediately when no probe is running.
    pub async fn wait_for_probe(&self) {
        let task = self.probe.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                tracing::error!(target: LOG_TARGET, error = %err, "primary connect task failed");
            }
        }
    }

    /// Cancel the connect loop and detach the primary.
    ///
    /// The router's handle is released on the blocking pool, since dropping
    /// the last SQLite handle joins its worker thread. A call still in flight
    /// holds its own handle and keeps the store open until it returns.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.wait_for_probe().await;
        if let Some(primary) = self.router.detach_primary() {
            tracing::info!(
                target: LOG_TARGET,
                backend = primary.backend(),
                "primary store detached for shutdown"
            );
            if let Err(err) = tokio::task::spawn_blocking(move || drop(primary)).await {
                tracing::error!(target: LOG_TARGET, error = %err, "releasing primary store failed");
            }
        }
    }
}

impl Drop for StoreContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn connect_loop(
    connector: Arc<dyn PrimaryConnector>,
    router: Arc<StoreRouter>,
    backoff: ConnectBackoff,
    cancel: CancellationToken,
    metrics: Option<StoreMetrics>,
) {
    let target = connector.describe();
    let mut delay = backoff.initial;
    let mut failures: u32 = 0;

    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            attempt = connector.connect() => attempt,
        };

        match attempt {
            Ok(store) => {
                if let Some(metrics) = &metrics {
                    metrics.record_connect_attempt("success");
                }
                tracing::info!(
                    target: LOG_TARGET,
                    target_db = %target,
                    failures,
                    "primary store connected"
                );
                router.attach_primary(store);
                return;
            }
            Err(err) => {
                failures += 1;
                if let Some(metrics) = &metrics {
                    metrics.record_connect_attempt("failure");
                }
                if !err.is_transport() {
                    tracing::error!(
                        target: LOG_TARGET,
                        target_db = %target,
                        error = %err,
                        "primary store cannot be used; staying on fallback"
                    );
                    return;
                }
                if backoff.attempts != 0 && failures >= backoff.attempts {
                    tracing::error!(
                        target: LOG_TARGET,
                        target_db = %target,
                        error = %err,
                        failures,
                        "giving up on primary store connection"
                    );
                    return;
                }
                tracing::warn!(
                    target: LOG_TARGET,
                    target_db = %target,
                    error = %err,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "primary store connection failed"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = backoff.next_delay(delay);
    }
}
