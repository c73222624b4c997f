//! Storage-agnostic record service and its backends.
//!
//! [`Service`] is the contract the CRUD binder talks to. Backends translate
//! their own failures into [`DomainError`] so the transport never sees a
//! backend-specific error type.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use memory::InMemoryService;
pub use postgres::PostgresService;

use crate::domain::{DeleteFilter, ListFilter, NewRecord, Record};
use crate::error::DomainError;

/// Create/get/list/delete contract for log records.
///
/// Implementations must be safe to call concurrently from many requests.
#[async_trait]
pub trait Service: Send + Sync + std::fmt::Debug {
    /// Validates and stores a new record, returning it with its assigned id.
    ///
    /// # Errors
    ///
    /// [`DomainError::Validation`] on empty required fields,
    /// [`DomainError::BadRequest`] on an unknown level,
    /// [`DomainError::Internal`] on storage failure.
    async fn create(&self, new: NewRecord) -> Result<Record, DomainError>;

    /// Fetches one record by its string id.
    ///
    /// # Errors
    ///
    /// [`DomainError::BadRequest`] if `id` is malformed,
    /// [`DomainError::NotFound`] if no record has that id.
    async fn get(&self, id: &str) -> Result<Record, DomainError>;

    /// Returns matching records, newest first.
    ///
    /// # Errors
    ///
    /// [`DomainError::Internal`] on storage failure.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Record>, DomainError>;

    /// Deletes by id or by cutoff.
    ///
    /// # Errors
    ///
    /// [`DomainError::BadRequest`] if a cutoff delete matches nothing,
    /// [`DomainError::Internal`] on storage failure.
    async fn delete(&self, filter: &DeleteFilter) -> Result<(), DomainError>;

    /// Releases backend resources. Call at most once.
    ///
    /// # Errors
    ///
    /// [`DomainError::Internal`] if the backend fails to shut down.
    async fn close(&self) -> Result<(), DomainError>;
}

/// Message used by every backend when a cutoff delete removes nothing.
pub(crate) const NOTHING_TO_DELETE: &str = "no logs found before the specified timestamp";
