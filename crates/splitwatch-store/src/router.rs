//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
//! Per-call selection between the primary and fallback stores.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use splitwatch_common::StoreConfig;

use crate::health::{HealthTracker, StoreHealth};
use crate::memory::FallbackStore;
use crate::metrics::{FallbackReason, StoreMetrics};
use crate::record::{NewTimingRecord, TimingRecord};
use crate::store::{Operation, RecordStore, SharedStore};
use crate::{Result, StoreError};

const LOG_TARGET: &str = "splitwatch::store::router";

/// First id handed out by the router's fallback store.
///
/// Primary-assigned ids stay below it, so a record written during an outage
/// can never be confused with a durable one, before or after recovery.
pub const FALLBACK_ID_BASE: i64 = 1 << 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Served {
    Primary,
    Fallback,
}

/// Timing knobs for [`StoreRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    /// Deadline applied to every primary call.
    pub call_timeout: Duration,
    /// How long an unhealthy primary is skipped before being retried.
    pub unhealthy_cooldown: Duration,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for RouterSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            call_timeout: config.call_timeout,
            unhealthy_cooldown: config.unhealthy_cooldown,
        }
    }
}

/// [`RecordStore`] that serves each call from the primary when it is attached
/// and healthy, and from the in-memory fallback otherwise.
///
/// Transport failures of the primary are absorbed: the same call is replayed
/// against the fallback and the caller only sees its result. Validation
/// failures are reported before any backend is touched.
///
/// Fallback records are numbered from [`FALLBACK_ID_BASE`]. Lookups and
/// deletes of those ids always go to the fallback, and lists served by the
/// primary are followed by whatever the fallback still holds.
pub struct StoreRouter {
    primary: RwLock<Option<SharedStore>>,
    fallback: Arc<FallbackStore>,
    health: HealthTracker,
    settings: RouterSettings,
    metrics: Option<StoreMetrics>,
}

impl StoreRouter {
    /// Router with no primary attached; every call goes to the fallback until
    /// [`StoreRouter::attach_primary`] is called.
    pub fn new(settings: RouterSettings, metrics: Option<StoreMetrics>) -> Self {
        Self {
            primary: RwLock::new(None),
            fallback: Arc::new(FallbackStore::with_first_id(FALLBACK_ID_BASE)),
            health: HealthTracker::new(settings.unhealthy_cooldown, metrics.clone()),
            settings,
            metrics,
        }
    }

    /// Install a connected primary store.
    pub fn attach_primary(&self, store: SharedStore) {
        tracing::info!(
            target: LOG_TARGET,
            backend = store.backend(),
            "primary store attached"
        );
        *self.primary.write() = Some(store);
        self.health.mark_connected();
    }

    /// Remove the primary; returns it so the caller can close it.
    pub fn detach_primary(&self) -> Option<SharedStore> {
        let previous = self.primary.write().take();
        if previous.is_some() {
            self.health.mark_absent();
        }
        previous
    }

    /// Whether a primary is currently attached, healthy or not.
    pub fn has_primary(&self) -> bool {
        self.primary.read().is_some()
    }

    /// Health of the primary as last observed.
    pub fn health(&self) -> StoreHealth {
        self.health.current()
    }

    /// The in-memory store used when the primary cannot serve a call.
    pub fn fallback(&self) -> &Arc<FallbackStore> {
        &self.fallback
    }

    /// Backend that served, or would serve, the latest call.
    pub fn serving_backend(&self) -> &'static str {
        if self.has_primary() && self.health() == StoreHealth::Healthy {
            "primary"
        } else {
            "fallback"
        }
    }

    fn select_primary(&self) -> std::result::Result<SharedStore, FallbackReason> {
        let primary = self.primary.read().clone();
        match primary {
            None => Err(FallbackReason::Absent),
            Some(store) if self.health.should_attempt() => Ok(store),
            Some(_) => Err(FallbackReason::Cooldown),
        }
    }

    async fn dispatch<T, F, Fut>(&self, operation: Operation, call: F) -> Result<(T, Served)>
    where
        F: Fn(SharedStore) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let reason = match self.select_primary() {
            Ok(primary) => {
                let outcome = tokio::time::timeout(self.settings.call_timeout, call(primary))
                    .await
                    .unwrap_or_else(|_| Err(StoreError::Timeout(self.settings.call_timeout)));
                match outcome {
                    Ok(value) => {
                        self.health.mark_success();
                        self.record_call("primary", operation);
                        return Ok((value, Served::Primary));
                    }
                    Err(err) if err.is_transport() => {
                        let detail = err.to_string();
                        self.health.mark_failure(&detail);
                        tracing::warn!(
                            target: LOG_TARGET,
                            operation = %operation,
                            error = %detail,
                            "primary store call failed; retrying against fallback"
                        );
                        FallbackReason::Transport
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(reason) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    operation = %operation,
                    reason = reason.as_str(),
                    "primary store unavailable; using fallback"
                );
                reason
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_fallback(operation, reason);
        }
        let fallback: SharedStore = self.fallback.clone();
        let value = call(fallback).await?;
        self.record_call("fallback", operation);
        Ok((value, Served::Fallback))
    }

    fn owned_by_fallback(&self, id: i64, operation: Operation) -> bool {
        let owned = id >= FALLBACK_ID_BASE;
        if owned {
            self.record_call("fallback", operation);
        }
        owned
    }

    fn record_call(&self, backend: &str, operation: Operation) {
        if let Some(metrics) = &self.metrics {
            metrics.record_call(backend, operation);
        }
    }
}

#[async_trait]
impl RecordStore for StoreRouter {
    fn backend(&self) -> &'static str {
        "router"
    }

    async fn list(&self, user_id: Option<i64>) -> Result<Vec<TimingRecord>> {
        let (mut records, served) = self
            .dispatch(Operation::List, |store| async move { store.list(user_id).await })
            .await?;
        if served == Served::Primary && !self.fallback.is_empty() {
            records.extend(self.fallback.list(user_id).await?);
        }
        Ok(records)
    }

    async fn get(&self, id: i64) -> Result<Option<TimingRecord>> {
        if self.owned_by_fallback(id, Operation::Get) {
            return self.fallback.get(id).await;
        }
        let (record, _) = self
            .dispatch(Operation::Get, |store| async move { store.get(id).await })
            .await?;
        Ok(record)
    }

    async fn create(&self, input: NewTimingRecord) -> Result<TimingRecord> {
        input.validate()?;
        let (record, _) = self
            .dispatch(Operation::Create, |store| {
                let input = input.clone();
                async move { store.create(input).await }
            })
            .await?;
        Ok(record)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        if self.owned_by_fallback(id, Operation::Delete) {
            return self.fallback.delete(id).await;
        }
        let (deleted, _) = self
            .dispatch(Operation::Delete, |store| async move { store.delete(id).await })
            .await?;
        Ok(deleted)
    }
}
