//! ---
//! sw_section: "01-core-functionality"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Stopwatch state machine and elapsed-time engine."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use splitwatch_common::format_duration;
use splitwatch_store::{NewTimingRecord, SharedStore, TimingRecord};

use crate::engine::TimerEngine;
use crate::state::TimerPhase;
use crate::{Result, TimerError};

/// A stopwatch paired with the store its finished runs are saved to.
pub struct StopwatchSession {
    engine: TimerEngine,
    store: SharedStore,
    user_id: Option<i64>,
}

impl StopwatchSession {
    /// Session saving anonymous records.
    pub fn new(engine: TimerEngine, store: SharedStore) -> Self {
        Self {
            engine,
            store,
            user_id: None,
        }
    }

    /// Attribute saved records to `user_id`.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// The underlying engine, for start/stop/reset.
    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    /// True when a stopped, non-zero value is waiting to be saved.
    pub fn can_save(&self) -> bool {
        let snapshot = self.engine.snapshot();
        snapshot.phase == TimerPhase::Stopped && snapshot.elapsed_ms > 0
    }

    /// Build the record input for the current frozen value. A blank title is
    /// replaced by the formatted duration.
    pub fn pending_record(&self, title: Option<&str>) -> Result<NewTimingRecord> {
        let snapshot = self.engine.snapshot();
        if snapshot.phase == TimerPhase::Running {
            return Err(TimerError::StillRunning);
        }
        if snapshot.elapsed_ms == 0 {
            return Err(TimerError::NothingToSave);
        }

        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format_duration(snapshot.elapsed_ms, true));
        let duration_ms = i64::try_from(snapshot.elapsed_ms).unwrap_or(i64::MAX);

        let mut input = NewTimingRecord::new(duration_ms).with_title(title);
        input.user_id = self.user_id;
        Ok(input)
    }

    /// Persist the stopped value. The timer itself is left untouched.
    pub async fn save(&self, title: Option<&str>) -> Result<TimingRecord> {
        let input = self.pending_record(title)?;
        let record = self.store.create(input).await?;
        tracing::info!(
            target: "splitwatch::timer",
            id = record.id,
            duration_ms = record.duration_ms,
            "stopwatch record saved"
        );
        Ok(record)
    }
}
