//! Reverse-proxy binder.
//!
//! Every request that no other binder claims is relayed to one fixed
//! downstream origin:
//!
//! ```text
//! Client ──▶ ProxyBinder (/, /{*path}) ──▶ Forwarder ──▶ downstream
//!                                             │
//!                                   strip hop-by-hop, X-Forwarded-*
//! ```

pub mod forwarder;
pub mod headers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use axum::routing::any;

pub use forwarder::Forwarder;

use crate::app::Binder;
use crate::pipeline::encode_error;

/// Default downstream origin.
pub const DEFAULT_DOWNSTREAM: &str = "http://faker:12003";

/// Proxy construction failures.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The downstream URL cannot be used as a forwarding origin.
    #[error("invalid downstream {url:?}: {reason}")]
    InvalidDownstream {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Binder mounting the catch-all forwarding routes.
#[derive(Debug, Clone)]
pub struct ProxyBinder {
    forwarder: Arc<Forwarder>,
}

impl ProxyBinder {
    /// Binder forwarding to `downstream`.
    ///
    /// # Errors
    ///
    /// See [`Forwarder::new`].
    pub fn new(downstream: &str, connect_timeout: Option<Duration>) -> Result<Self, ProxyError> {
        Ok(Self {
            forwarder: Arc::new(Forwarder::new(downstream, connect_timeout)?),
        })
    }

    /// The underlying forwarder.
    #[must_use]
    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }
}

impl Binder for ProxyBinder {
    fn name(&self) -> &str {
        "proxy"
    }

    fn bind(&self, router: Router) -> Router {
        let routes = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(Arc::clone(&self.forwarder));
        router.merge(routes)
    }
}

async fn proxy_handler(State(forwarder): State<Arc<Forwarder>>, req: Request) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    match forwarder.forward(req, client).await {
        Ok(response) => response,
        Err(err) => encode_error(&err),
    }
}
