//! Domain layer: records, identifiers, levels and query filters.
//!
//! These types are storage-agnostic. Every [`crate::service::Service`]
//! backend consumes and produces them, and every validation failure is
//! reported through [`crate::error::DomainError`].

pub mod filter;
pub mod level;
pub mod record;
pub mod record_id;

pub use filter::{DeleteFilter, ListFilter};
pub use level::LogLevel;
pub use record::{Metadata, NewRecord, Record};
pub use record_id::RecordId;
