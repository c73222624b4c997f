//! PostgreSQL implementation of the record service.
//!
//! Records live in a single `records` table; metadata is stored as a JSONB
//! document. Every statement is bounded by a store timeout independent of
//! the caller's own cancellation: dropping the request future drops the
//! in-flight query with it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{NOTHING_TO_DELETE, Service};
use crate::domain::{DeleteFilter, ListFilter, NewRecord, Record, RecordId};
use crate::error::DomainError;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

type RecordRow = (
    Uuid,
    DateTime<Utc>,
    String,
    String,
    Option<serde_json::Value>,
);

const SELECT_COLUMNS: &str = "SELECT id, created_at, level, message, metadata FROM records";

/// PostgreSQL-backed [`Service`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresService {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresService {
    /// Wraps an existing pool. The schema must already exist.
    #[must_use]
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Connects, verifies the connection and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Internal`] if the database is unreachable
    /// within `timeout` or a migration fails.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| DomainError::from(e).context("failed to connect to PostgreSQL"))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                DomainError::internal(e.to_string()).context("failed to migrate records schema")
            })?;

        tracing::info!(max_connections, ?timeout, "connected to PostgreSQL");
        Ok(Self::new(pool, timeout))
    }

    /// Runs `fut` under the store timeout, tagging failures with `what`.
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "{what}");
                Err(DomainError::from(err).context(what))
            }
            Err(_) => {
                tracing::error!(timeout = ?self.timeout, "{what}: timed out");
                Err(DomainError::internal(format!(
                    "store call timed out after {:?}",
                    self.timeout
                ))
                .context(what))
            }
        }
    }
}

#[async_trait]
impl Service for PostgresService {
    async fn create(&self, new: NewRecord) -> Result<Record, DomainError> {
        let mut record = new.into_record()?;
        record.timestamp = record.timestamp.trunc_subsecs(6);
        let metadata = record.metadata.clone().map(serde_json::Value::Object);

        self.bounded(
            "failed to insert log entry",
            sqlx::query(
                "INSERT INTO records (id, created_at, level, message, metadata) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(*record.id.as_uuid())
            .bind(record.timestamp)
            .bind(record.level.as_str())
            .bind(&record.message)
            .bind(metadata)
            .execute(&self.pool),
        )
        .await?;

        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Record, DomainError> {
        let id: RecordId = id.parse()?;
        let row = self
            .bounded(
                "failed to get log entry",
                sqlx::query_as::<_, RecordRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
                    .bind(*id.as_uuid())
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.map(record_from_row)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(format!("log entry {id} not found")))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Record>, DomainError> {
        let mut query = list_query(filter)?;
        let rows = self
            .bounded(
                "failed to query logs",
                query.build_query_as::<RecordRow>().fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn delete(&self, filter: &DeleteFilter) -> Result<(), DomainError> {
        match *filter {
            DeleteFilter::ById(id) => {
                self.bounded(
                    "failed to delete log entry",
                    sqlx::query("DELETE FROM records WHERE id = $1")
                        .bind(*id.as_uuid())
                        .execute(&self.pool),
                )
                .await?;
                Ok(())
            }
            DeleteFilter::Before(cutoff) => {
                let cutoff_at = millis_to_datetime(cutoff)?;
                let result = self
                    .bounded(
                        "failed to delete log entries",
                        sqlx::query("DELETE FROM records WHERE created_at < $1")
                            .bind(cutoff_at)
                            .execute(&self.pool),
                    )
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DomainError::bad_request(NOTHING_TO_DELETE));
                }
                tracing::debug!(cutoff, removed = result.rows_affected(), "records deleted");
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<(), DomainError> {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
        Ok(())
    }
}

fn record_from_row(
    (id, timestamp, level, message, metadata): RecordRow,
) -> Result<Record, DomainError> {
    let level = level
        .parse()
        .map_err(|_| DomainError::internal(format!("stored record {id} has level {level:?}")))?;
    let metadata = match metadata {
        Some(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    };
    Ok(Record {
        id: RecordId::from_uuid(id),
        timestamp,
        level,
        message,
        metadata,
    })
}

/// Builds the `SELECT` for [`Service::list`].
fn list_query(filter: &ListFilter) -> Result<QueryBuilder<'static, Postgres>, DomainError> {
    let mut query = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
    query.push(" WHERE TRUE");

    if let Some(level) = filter.level {
        query.push(" AND level = ").push_bind(level.as_str());
    }
    if let Some(message) = &filter.message {
        query
            .push(" AND message ILIKE ")
            .push_bind(format!("%{}%", escape_like(message)))
            .push(" ESCAPE '\\'");
    }
    if let Some(start) = filter.start_millis {
        query
            .push(" AND created_at >= ")
            .push_bind(millis_to_datetime(start)?);
    }
    if let Some(end) = filter.end_millis {
        // Inclusive at millisecond granularity; no bound past the last
        // representable instant.
        if let Some(end_at) = millis_to_datetime(end)?
            .checked_add_signed(TimeDelta::milliseconds(1))
        {
            query.push(" AND created_at < ").push_bind(end_at);
        }
    }
    for (key, value) in &filter.metadata {
        // Scalars only, matching Record::metadata_matches.
        query
            .push(" AND jsonb_typeof(metadata -> ")
            .push_bind(key.clone())
            .push(") IN ('string', 'number', 'boolean') AND metadata ->> ")
            .push_bind(key.clone())
            .push(" = ")
            .push_bind(value.clone());
    }

    query.push(" ORDER BY created_at DESC, seq DESC");
    if let Some(recent) = filter.recent {
        query
            .push(" LIMIT ")
            .push_bind(i64::try_from(recent).unwrap_or(i64::MAX));
    }
    Ok(query)
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, DomainError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DomainError::bad_request(format!("timestamp out of range: {millis}")))
}

/// Escapes `LIKE` metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_quotes_metacharacters() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn row_with_unknown_level_is_internal() {
        let row: RecordRow = (Uuid::new_v4(), Utc::now(), "loud".into(), "m".into(), None);
        let err = record_from_row(row).err();
        assert!(matches!(err, Some(DomainError::Internal(_))));
    }

    #[test]
    fn row_metadata_must_be_an_object() {
        let row: RecordRow = (
            Uuid::new_v4(),
            Utc::now(),
            "info".into(),
            "m".into(),
            Some(serde_json::json!([1, 2])),
        );
        let record = record_from_row(row).ok();
        assert!(record.is_some_and(|r| r.metadata.is_none()));
    }

    #[test]
    fn metadata_filter_only_compares_scalars() {
        let Ok(filter) = ListFilter::from_query([("retries", "3"), ("endtime", "1000")]) else {
            panic!("valid filter");
        };
        let Ok(query) = list_query(&filter) else {
            panic!("query builds");
        };
        let sql = query.sql();
        assert!(
            sql.contains("jsonb_typeof(metadata -> $2) IN ('string', 'number', 'boolean')")
        );
        assert!(sql.contains("metadata ->> $3 = $4"));
        assert!(sql.contains("created_at < $1"));
    }

    #[test]
    fn latest_end_bound_is_open() {
        let filter = ListFilter {
            end_millis: Some(DateTime::<Utc>::MAX_UTC.timestamp_millis()),
            ..ListFilter::default()
        };
        let Ok(query) = list_query(&filter) else {
            panic!("query builds");
        };
        assert!(!query.sql().contains("created_at <"));
    }

    #[test]
    fn out_of_range_millis_is_bad_request() {
        let err = millis_to_datetime(i64::MAX).err();
        assert!(matches!(err, Some(DomainError::BadRequest(_))));
    }
}
