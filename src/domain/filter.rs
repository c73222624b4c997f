//! Query filters for listing and deleting records.
//!
//! Both filters are built from raw query pairs. Numeric fields are parsed
//! and range-checked up front so a malformed value is rejected with
//! [`DomainError::BadRequest`] before any backend is consulted.

use chrono::{DateTime, Utc};

use super::{LogLevel, Record, RecordId};
use crate::error::DomainError;

/// Query keys with a dedicated meaning; everything else is metadata.
const RESERVED_KEYS: [&str; 5] = ["level", "message", "starttime", "endtime", "recent"];

/// Filter applied by [`crate::service::Service::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Exact level match.
    pub level: Option<LogLevel>,
    /// Case-insensitive substring match on the message.
    pub message: Option<String>,
    /// Inclusive lower bound, epoch milliseconds.
    pub start_millis: Option<i64>,
    /// Inclusive upper bound, epoch milliseconds.
    pub end_millis: Option<i64>,
    /// Maximum number of records returned, newest first.
    pub recent: Option<usize>,
    /// Metadata equality constraints, all of which must hold.
    pub metadata: Vec<(String, String)>,
}

impl ListFilter {
    /// Builds a filter from query pairs. Empty values are ignored and the
    /// first occurrence of a repeated key wins.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BadRequest`] if `level` is unknown, if
    /// `starttime`, `endtime` or `recent` is not an integer, or if a time
    /// bound is outside the representable range.
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        let mut seen: Vec<String> = Vec::new();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            if value.is_empty() || seen.iter().any(|k| k == key) {
                continue;
            }
            seen.push(key.to_string());

            match key {
                "level" => filter.level = Some(value.parse()?),
                "message" => filter.message = Some(value.to_string()),
                "starttime" => {
                    filter.start_millis = Some(parse_millis(value, "invalid start time format")?);
                }
                "endtime" => {
                    filter.end_millis = Some(parse_millis(value, "invalid end time format")?);
                }
                "recent" => {
                    let n = value.parse::<usize>().map_err(|_| {
                        DomainError::bad_request(format!("invalid recent value: {value}"))
                    })?;
                    filter.recent = Some(n);
                }
                other => {
                    let meta_key = other.strip_prefix("metadata.").unwrap_or(other);
                    if !meta_key.is_empty() && !RESERVED_KEYS.contains(&other) {
                        filter.metadata.push((meta_key.to_string(), value.to_string()));
                    }
                }
            }
        }

        Ok(filter)
    }

    /// Returns `true` if `record` satisfies every constraint except `recent`.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        if self.level.is_some_and(|l| l != record.level) {
            return false;
        }
        if let Some(needle) = &self.message
            && !record
                .message
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        let ts = record.timestamp_millis();
        if self.start_millis.is_some_and(|start| ts < start) {
            return false;
        }
        if self.end_millis.is_some_and(|end| ts > end) {
            return false;
        }
        self.metadata
            .iter()
            .all(|(k, v)| record.metadata_matches(k, v))
    }
}

/// Selector for [`crate::service::Service::delete`]; exactly one is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFilter {
    /// Delete a single record.
    ById(RecordId),
    /// Delete every record strictly older than this epoch-millisecond cutoff.
    Before(i64),
}

impl DeleteFilter {
    /// Builds a selector from query pairs (`id` XOR `before`).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BadRequest`] when neither or both selectors are
    /// present, or when the present one is malformed.
    pub fn from_query<I, K, V>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut id = None;
        let mut before = None;
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "id" if id.is_none() => id = Some(value.to_string()),
                "before" if before.is_none() => before = Some(value.to_string()),
                _ => {}
            }
        }

        match (id, before) {
            (Some(_), Some(_)) => Err(DomainError::bad_request(
                "only one of id or before can be provided",
            )),
            (None, None) => Err(DomainError::bad_request(
                "either id or before timestamp must be provided",
            )),
            (Some(id), None) => Ok(Self::ById(id.parse()?)),
            (None, Some(before)) => Ok(Self::Before(parse_millis(
                &before,
                "invalid epoch timestamp format",
            )?)),
        }
    }
}

/// Parses epoch milliseconds that map onto a real [`DateTime<Utc>`].
fn parse_millis(value: &str, what: &str) -> Result<i64, DomainError> {
    let millis = value
        .parse::<i64>()
        .map_err(|_| DomainError::bad_request(format!("{what}: {value}")))?;
    if DateTime::<Utc>::from_timestamp_millis(millis).is_none() {
        return Err(DomainError::bad_request(format!(
            "timestamp out of range: {millis}"
        )));
    }
    Ok(millis)
}
