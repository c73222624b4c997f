//! Domain error taxonomy with HTTP status code mapping.
//!
//! [`DomainError`] is the closed set of failures every [`crate::service::Service`]
//! backend reports. Each variant maps to exactly one HTTP status and one
//! stable message; the mapping is applied by
//! [`crate::pipeline::encode_error`] for every route in the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Uniform JSON error envelope written for every failed request.
///
/// ```json
/// {
///   "Message": "bad request",
///   "Code": 400,
///   "Error": "invalid log ID format"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorEnvelope {
    /// Stable category message (one per taxonomy member).
    pub message: String,
    /// HTTP status code.
    pub code: u16,
    /// Diagnostic detail of the underlying failure.
    pub error: String,
}

/// Classification of why a service or pipeline stage failed.
///
/// Variants survive contextual wrapping (see [`DomainError::context`]) so the
/// error encoder can always recover the category.
///
/// | Variant      | HTTP Status | Message                                 |
/// |--------------|-------------|-----------------------------------------|
/// | `BadRequest` | 400         | `bad request`                           |
/// | `Validation` | 400         | `Bad Request, required fields missing`  |
/// | `NotFound`   | 404         | `not found`                             |
/// | `Internal`   | 500         | `internal server error`                 |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// No record matched the request.
    #[error("{0}")]
    NotFound(String),

    /// A required input field is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// Malformed identifier, conflicting selectors or non-numeric numeric field.
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected backend or runtime failure.
    #[error("{0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Shorthand for [`DomainError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for [`DomainError::BadRequest`].
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Shorthand for [`DomainError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Prefixes the detail with `ctx`, keeping the variant.
    #[must_use]
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound(m) => Self::NotFound(format!("{ctx}: {m}")),
            Self::Validation(m) => Self::Validation(format!("{ctx}: {m}")),
            Self::BadRequest(m) => Self::BadRequest(format!("{ctx}: {m}")),
            Self::Internal(m) => Self::Internal(format!("{ctx}: {m}")),
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable, client-facing message for this variant.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad request",
            Self::Validation(_) => "Bad Request, required fields missing",
            Self::NotFound(_) => "not found",
            Self::Internal(_) => "internal server error",
        }
    }

    /// Builds the wire envelope for this error.
    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            message: self.message().to_string(),
            code: self.status_code().as_u16(),
            error: self.to_string(),
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        crate::pipeline::encode_error(&self)
    }
}
