//! Pluggable route-registration units.

use async_trait::async_trait;
use axum::Router;

use crate::error::DomainError;

/// A named unit that registers its routes on the shared router.
///
/// [`Binder::bind`] is called exactly once, at composition time, in
/// registration order. Calling it twice would register duplicate routes and
/// is not supported. [`Binder::close`] is called once after the transport
/// has drained.
#[async_trait]
pub trait Binder: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Adds this binder's routes to `router` and returns it.
    fn bind(&self, router: Router) -> Router;

    /// Releases resources owned by the binder.
    ///
    /// # Errors
    ///
    /// Returns the owned service's error if it fails to shut down.
    async fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
