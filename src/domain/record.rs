//! Stored log record and its creation payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{LogLevel, RecordId};
use crate::error::DomainError;

/// Open-ended metadata attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A log record as persisted by a [`crate::service::Service`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Record {
    /// Unique identifier, assigned once on create.
    #[schema(value_type = String, format = Uuid)]
    pub id: RecordId,
    /// Creation time (immutable).
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Free-form message text.
    pub message: String,
    /// Optional structured metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

impl Record {
    /// Epoch milliseconds of [`Record::timestamp`], the unit used by filters.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Returns `true` if `metadata[key]` is a scalar equal to `expected`.
    ///
    /// Strings compare as-is. Numbers and booleans compare by their JSON
    /// text, so `?retries=3` matches `{"retries": 3}`. Null, arrays and
    /// objects never match.
    #[must_use]
    pub fn metadata_matches(&self, key: &str, expected: &str) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .is_some_and(|v| match v {
                serde_json::Value::String(s) => s == expected,
                serde_json::Value::Number(n) => n.to_string() == expected,
                serde_json::Value::Bool(b) => b.to_string() == expected,
                serde_json::Value::Null
                | serde_json::Value::Array(_)
                | serde_json::Value::Object(_) => false,
            })
    }
}

/// Unvalidated create payload, as decoded from a request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct NewRecord {
    /// Severity name (`debug`, `info`, `warn`, `error`, `fatal`).
    pub level: String,
    /// Message text.
    pub message: String,
    /// Optional metadata object.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

impl NewRecord {
    /// Creates a payload without metadata.
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            metadata: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validates the payload and stamps it with a fresh id and timestamp.
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] if `level` or `message` is empty.
    /// - [`DomainError::BadRequest`] if `level` is not a known severity.
    pub fn into_record(self) -> Result<Record, DomainError> {
        if self.level.trim().is_empty() || self.message.trim().is_empty() {
            return Err(DomainError::validation(
                "validation failed, level and message are required",
            ));
        }
        let level: LogLevel = self.level.parse()?;
        Ok(Record {
            id: RecordId::generate(),
            timestamp: Utc::now(),
            level,
            message: self.message,
            metadata: self.metadata.filter(|m| !m.is_empty()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_record_assigns_identity() {
        let Ok(record) = NewRecord::new("info", "hi").into_record() else {
            panic!("valid payload");
        };
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.message, "hi");
        assert!(record.metadata.is_none());
    }

    #[test]
    fn empty_fields_are_validation_errors() {
        let err = NewRecord::new("", "hi").into_record().err();
        assert!(matches!(err, Some(DomainError::Validation(_))));

        let err = NewRecord::new("info", "  ").into_record().err();
        assert!(matches!(err, Some(DomainError::Validation(_))));
    }

    #[test]
    fn unknown_level_is_bad_request() {
        let err = NewRecord::new("loud", "hi").into_record().err();
        assert!(matches!(err, Some(DomainError::BadRequest(_))));
    }

    #[test]
    fn metadata_matching_compares_json_text() {
        let Some(meta) = json!({"service": "api", "retries": 3}).as_object().cloned() else {
            panic!("object literal");
        };
        let Ok(record) = NewRecord::new("warn", "slow")
            .with_metadata(meta)
            .into_record()
        else {
            panic!("valid payload");
        };
        assert!(record.metadata_matches("service", "api"));
        assert!(record.metadata_matches("retries", "3"));
        assert!(!record.metadata_matches("service", "worker"));
        assert!(!record.metadata_matches("missing", "x"));
    }
}
