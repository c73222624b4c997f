//! Decoders, endpoints and DTOs for the log-record routes.
//!
//! Decoders only check structure (body parses, required fields present,
//! parameters present). Business rules are enforced by the [`Service`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{DeleteFilter, ListFilter, Metadata, NewRecord, Record};
use crate::error::{DomainError, ErrorEnvelope};
use crate::pipeline::RawRequest;
use crate::service::Service;

/// Collection route.
pub const LOGS_PATH: &str = "/v1.0/logs";

/// Single-record route.
pub const LOG_PATH: &str = "/v1.0/logs/{id}";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Response body for `POST /v1.0/logs`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateResponse {
    /// Always `"success"`.
    pub status: String,
    /// Human-readable confirmation.
    pub message: String,
    /// The stored record, including its assigned id.
    pub data: Record,
}

// ── Decoders ────────────────────────────────────────────────────────────

/// Decodes a JSON or form-encoded create payload.
///
/// Form payloads carry `level`, `message` and any number of
/// `metadata.<key>` fields.
///
/// # Errors
///
/// [`DomainError::BadRequest`] if the body does not parse or lacks
/// `level`/`message`.
pub fn decode_create(raw: &RawRequest) -> Result<NewRecord, DomainError> {
    if raw.content_type().as_deref() == Some(FORM_CONTENT_TYPE) {
        return decode_create_form(raw);
    }
    serde_json::from_slice::<NewRecord>(&raw.body)
        .map_err(|e| DomainError::bad_request(format!("failed to decode request: {e}")))
}

fn decode_create_form(raw: &RawRequest) -> Result<NewRecord, DomainError> {
    let mut level = None;
    let mut message = None;
    let mut metadata = Metadata::new();

    for (key, value) in url::form_urlencoded::parse(&raw.body) {
        match key.as_ref() {
            "level" => level = Some(value.into_owned()),
            "message" => message = Some(value.into_owned()),
            other => {
                if let Some(meta_key) = other.strip_prefix("metadata.")
                    && !meta_key.is_empty()
                {
                    metadata.insert(
                        meta_key.to_string(),
                        serde_json::Value::String(value.into_owned()),
                    );
                }
            }
        }
    }

    let (Some(level), Some(message)) = (level, message) else {
        return Err(DomainError::bad_request("level and message are required"));
    };
    let new = NewRecord::new(level, message);
    Ok(if metadata.is_empty() {
        new
    } else {
        new.with_metadata(metadata)
    })
}

/// Extracts the `{id}` path parameter.
///
/// # Errors
///
/// [`DomainError::BadRequest`] if the route captured no id.
pub fn decode_id(raw: &RawRequest) -> Result<String, DomainError> {
    raw.param("id")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DomainError::bad_request("id missing from url params"))
}

/// Builds a [`ListFilter`] from the query string.
///
/// # Errors
///
/// [`DomainError::BadRequest`] on an unknown level or a non-integer
/// numeric filter.
pub fn decode_list(raw: &RawRequest) -> Result<ListFilter, DomainError> {
    ListFilter::from_query(raw.query_pairs())
}

/// Builds a [`DeleteFilter`] from `?id=` XOR `?before=`.
///
/// # Errors
///
/// [`DomainError::BadRequest`] when neither or both selectors are present.
pub fn decode_delete(raw: &RawRequest) -> Result<DeleteFilter, DomainError> {
    DeleteFilter::from_query(raw.query_pairs())
}

/// Builds a [`DeleteFilter::ById`] from the `{id}` path parameter.
///
/// # Errors
///
/// [`DomainError::BadRequest`] if the id is missing or malformed, or if the
/// query string also names a selector.
pub fn decode_delete_by_path(raw: &RawRequest) -> Result<DeleteFilter, DomainError> {
    let id = decode_id(raw)?;
    if raw
        .query_pairs()
        .iter()
        .any(|(k, v)| (k == "id" || k == "before") && !v.is_empty())
    {
        return Err(DomainError::bad_request(
            "only one of id or before can be provided",
        ));
    }
    Ok(DeleteFilter::ById(id.parse()?))
}

// ── Endpoints ───────────────────────────────────────────────────────────

/// `POST /v1.0/logs`: Create a log record.
///
/// # Errors
///
/// Propagates the service's [`DomainError`].
#[utoipa::path(
    post,
    path = "/v1.0/logs",
    tag = "Logs",
    summary = "Create a log record",
    description = "Accepts JSON or form data. `level` and `message` are required; `metadata` is an optional object (form: `metadata.<key>` fields).",
    request_body = NewRecord,
    responses(
        (status = 200, description = "Record stored", body = CreateResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorEnvelope),
    )
)]
pub async fn create_record(
    service: Arc<dyn Service>,
    new: NewRecord,
) -> Result<CreateResponse, DomainError> {
    let record = service.create(new).await?;
    Ok(CreateResponse {
        status: "success".to_string(),
        message: "Log entry created successfully".to_string(),
        data: record,
    })
}

/// `GET /v1.0/logs/{id}`: Fetch one record.
///
/// # Errors
///
/// Propagates the service's [`DomainError`].
#[utoipa::path(
    get,
    path = "/v1.0/logs/{id}",
    tag = "Logs",
    summary = "Get a log record",
    params(
        ("id" = String, Path, description = "Record UUID"),
    ),
    responses(
        (status = 200, description = "Record", body = Record),
        (status = 400, description = "Malformed id", body = ErrorEnvelope),
        (status = 404, description = "No such record", body = ErrorEnvelope),
    )
)]
pub async fn get_record(service: Arc<dyn Service>, id: String) -> Result<Record, DomainError> {
    service.get(&id).await
}

/// `GET /v1.0/logs`: List records, newest first.
///
/// # Errors
///
/// Propagates the service's [`DomainError`].
#[utoipa::path(
    get,
    path = "/v1.0/logs",
    tag = "Logs",
    summary = "List log records",
    description = "Unrecognised query keys filter on metadata equality.",
    params(
        ("level" = Option<String>, Query, description = "Exact level"),
        ("message" = Option<String>, Query, description = "Case-insensitive substring"),
        ("starttime" = Option<i64>, Query, description = "Inclusive lower bound, epoch ms"),
        ("endtime" = Option<i64>, Query, description = "Inclusive upper bound, epoch ms"),
        ("recent" = Option<usize>, Query, description = "Return at most N newest records"),
    ),
    responses(
        (status = 200, description = "Matching records", body = Vec<Record>),
        (status = 400, description = "Malformed filter", body = ErrorEnvelope),
    )
)]
pub async fn list_records(
    service: Arc<dyn Service>,
    filter: ListFilter,
) -> Result<Vec<Record>, DomainError> {
    service.list(&filter).await
}

/// `DELETE /v1.0/logs` and `DELETE /v1.0/logs/{id}`: Delete records.
///
/// # Errors
///
/// Propagates the service's [`DomainError`].
#[utoipa::path(
    delete,
    path = "/v1.0/logs",
    tag = "Logs",
    summary = "Delete log records",
    description = "Exactly one of `id` or `before` must be given. `before` deletes every record strictly older than the cutoff.",
    params(
        ("id" = Option<String>, Query, description = "Record UUID"),
        ("before" = Option<i64>, Query, description = "Cutoff, epoch ms"),
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Zero or both selectors, or nothing to delete", body = ErrorEnvelope),
    )
)]
pub async fn delete_records(
    service: Arc<dyn Service>,
    filter: DeleteFilter,
) -> Result<(), DomainError> {
    service.delete(&filter).await
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{Method, Uri, header};

    fn raw(method: Method, uri: &str, body: &'static str) -> RawRequest {
        let Ok(uri) = uri.parse::<Uri>() else {
            panic!("valid uri");
        };
        RawRequest::new(method, uri, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn create_decodes_json() {
        let req = raw(
            Method::POST,
            LOGS_PATH,
            r#"{"level":"info","message":"hi","metadata":{"svc":"api"}}"#,
        );
        let Ok(new) = decode_create(&req) else {
            panic!("valid json");
        };
        assert_eq!(new.level, "info");
        assert_eq!(new.message, "hi");
        assert!(new.metadata.is_some_and(|m| m.contains_key("svc")));
    }

    #[test]
    fn create_requires_fields_present() {
        let err = decode_create(&raw(Method::POST, LOGS_PATH, r#"{"level":"info"}"#)).err();
        assert!(matches!(err, Some(DomainError::BadRequest(_))));

        let err = decode_create(&raw(Method::POST, LOGS_PATH, "not json")).err();
        assert!(matches!(err, Some(DomainError::BadRequest(_))));
    }

    #[test]
    fn create_decodes_form() {
        let req = raw(
            Method::POST,
            LOGS_PATH,
            "level=warn&message=disk+full&metadata.host=db1",
        )
        .with_header(header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        let Ok(new) = decode_create(&req) else {
            panic!("valid form");
        };
        assert_eq!(new.level, "warn");
        assert_eq!(new.message, "disk full");
        let host = new
            .metadata
            .as_ref()
            .and_then(|m| m.get("host"))
            .and_then(|v| v.as_str());
        assert_eq!(host, Some("db1"));

        let missing = raw(Method::POST, LOGS_PATH, "level=warn")
            .with_header(header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        assert!(matches!(
            decode_create(&missing),
            Err(DomainError::BadRequest(_))
        ));
    }

    #[test]
    fn id_comes_from_path() {
        let req = raw(Method::GET, "/v1.0/logs/abc", "").with_param("id", "abc");
        assert_eq!(decode_id(&req).ok().as_deref(), Some("abc"));

        let err = decode_id(&raw(Method::GET, "/v1.0/logs/", "")).err();
        assert!(matches!(err, Some(DomainError::BadRequest(_))));
    }

    #[test]
    fn delete_by_path_rejects_extra_selector() {
        let id = crate::domain::RecordId::generate().to_string();
        let req = raw(Method::DELETE, "/v1.0/logs/x?before=10", "").with_param("id", id.clone());
        assert!(matches!(
            decode_delete_by_path(&req),
            Err(DomainError::BadRequest(_))
        ));

        let req = raw(Method::DELETE, "/v1.0/logs/x", "").with_param("id", id);
        assert!(matches!(
            decode_delete_by_path(&req),
            Ok(DeleteFilter::ById(_))
        ));
    }
}
