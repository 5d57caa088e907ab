//! ---
//! sw_section: "03-persistence-logging"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Timing record persistence abstractions and storage bindings."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// Largest duration the relational column can hold (32-bit signed integer).
pub const MAX_DURATION_MS: i64 = i32::MAX as i64;

/// Persisted, immutable snapshot of one completed timing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Optional owning user; not enforced by the store.
    pub user_id: Option<i64>,
    /// Optional free-text label.
    pub title: Option<String>,
    /// Elapsed milliseconds at the moment of save.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Insertion timestamp, millisecond precision.
    pub created_at: DateTime<Utc>,
}

/// Input accepted by [`crate::RecordStore::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimingRecord {
    /// Optional owning user.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Optional label; callers may substitute a formatted duration.
    #[serde(default)]
    pub title: Option<String>,
    /// Elapsed milliseconds; validated to `0..=MAX_DURATION_MS`.
    #[serde(rename = "duration")]
    pub duration_ms: i64,
}

impl NewTimingRecord {
    /// Record with only a duration.
    pub fn new(duration_ms: i64) -> Self {
        Self {
            user_id: None,
            title: None,
            duration_ms,
        }
    }

    /// Attach a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach an owning user.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Collect every contract violation of this input.
    pub fn validation_errors(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        if self.duration_ms < 0 {
            errors.push("duration", "Number must be greater than or equal to 0");
        } else if self.duration_ms > MAX_DURATION_MS {
            errors.push(
                "duration",
                format!("Number must be less than or equal to {MAX_DURATION_MS}"),
            );
        }
        errors
    }

    /// Fail with [`StoreError::Validation`] when the input is not storable.
    pub fn validate(&self) -> Result<()> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(errors))
        }
    }

    /// Materialise the record a store persists for this input.
    pub(crate) fn into_record(self, id: i64, created_at: DateTime<Utc>) -> Result<TimingRecord> {
        self.validate()?;
        Ok(TimingRecord {
            id,
            user_id: self.user_id,
            title: self.title,
            duration_ms: self.duration_ms.unsigned_abs(),
            created_at,
        })
    }
}

/// Timestamp assigned at insertion, truncated to milliseconds so both stores
/// hand out identical precision.
pub(crate) fn insertion_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Field-keyed validation messages, serialised as the 400 detail payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Errors carrying a single message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    /// Add a message for `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// True when no field has a message.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages recorded for `field`.
    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One-line rendering used in logs and error displays.
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_uses_wire_field_names() {
        let created_at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = TimingRecord {
            id: 7,
            user_id: None,
            title: Some("Lap".into()),
            duration_ms: 3_661_230,
            created_at,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["userId"], json!(null));
        assert_eq!(value["title"], json!("Lap"));
        assert_eq!(value["duration"], json!(3_661_230));
        assert_eq!(value["createdAt"], json!("2024-05-01T10:00:00.250Z"));
    }

    #[test]
    fn negative_and_oversized_durations_are_rejected() {
        assert!(NewTimingRecord::new(0).validate().is_ok());
        assert!(NewTimingRecord::new(MAX_DURATION_MS).validate().is_ok());

        let negative = NewTimingRecord::new(-1).validation_errors();
        assert_eq!(negative.messages("duration").len(), 1);

        let oversized = NewTimingRecord::new(MAX_DURATION_MS + 1);
        assert!(matches!(
            oversized.validate(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn optional_fields_default_to_absent() {
        let input: NewTimingRecord = serde_json::from_value(json!({ "duration": 1500 })).unwrap();
        assert_eq!(input, NewTimingRecord::new(1500));
    }

    #[test]
    fn insertion_timestamp_has_millisecond_precision() {
        let ts = insertion_timestamp();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
