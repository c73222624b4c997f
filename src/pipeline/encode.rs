//! Response encoders and the shared error encoder.

use std::any::Any;

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::DomainError;

/// Serializes `value` as a `200 OK` JSON body.
///
/// # Errors
///
/// Returns [`DomainError::Internal`] if serialization fails.
pub fn encode_json<T: Serialize>(value: T) -> Result<Response, DomainError> {
    let body = serde_json::to_vec(&value)
        .map_err(|e| DomainError::internal(format!("failed to encode response: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Emits `204 No Content` when `value` carries nothing (unit, `None`,
/// `null`), otherwise falls back to [`encode_json`].
///
/// # Errors
///
/// Returns [`DomainError::Internal`] if serialization fails.
pub fn encode_no_content<T: Serialize>(value: T) -> Result<Response, DomainError> {
    let json = serde_json::to_value(&value)
        .map_err(|e| DomainError::internal(format!("failed to encode response: {e}")))?;
    if json.is_null() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    encode_json(json)
}

/// Maps a [`DomainError`] to its status and JSON envelope.
///
/// This is the only place in the process where error categories become
/// status codes.
pub fn encode_error(err: &DomainError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %err, "request failed");
    }
    let mut response = Json(err.envelope()).into_response();
    *response.status_mut() = status;
    response
}

/// Converts a caught panic payload into an `Internal` response.
pub fn encode_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = detail, "request handler panicked");
    encode_error(&DomainError::internal(format!("request handler panicked: {detail}")))
}
