//! Composition root: shared router, ordered binders, process lifecycle.
//!
//! ```text
//! AppBuilder ── address / binder / request_timeout ──▶ build()
//!     │                                                  │
//!     │            each Binder::bind(router), in order   │
//!     ▼                                                  ▼
//!   App ── run(shutdown) ── bind ──▶ Listening ── shutdown ──▶ drain ──▶ close binders ──▶ Closed
//! ```

mod binder;
mod signal;

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use binder::Binder;
pub use signal::shutdown_signal;

use crate::error::{DomainError, ErrorEnvelope};
use crate::pipeline::{encode_error, encode_panic};

/// Address used when [`AppBuilder::address`] is never called.
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 6061);

/// Composition and transport failures.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Host or port could not be turned into a socket address.
    #[error("invalid listen address {addr:?}: {reason}")]
    InvalidAddress {
        /// The rejected `host:port` text.
        addr: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two binders were registered under the same name.
    #[error("binder {0:?} registered twice")]
    DuplicateBinder(String),

    /// The listener could not be bound. Not retried.
    #[error("failed to start transport on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The transport stopped with an I/O error.
    #[error("http transport failed: {0}")]
    Serve(#[source] std::io::Error),

    /// A binder failed to release its resources.
    #[error("binder {name:?} failed to close: {source}")]
    Close {
        /// Binder name.
        name: String,
        /// The binder's error.
        #[source]
        source: DomainError,
    },
}

/// Observable lifecycle state of an [`App`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Composed, not yet accepting connections.
    NotStarted,
    /// Accepting connections on the given address.
    Listening(SocketAddr),
    /// Transport drained and binders closed.
    Closed,
}

/// Ordered, failable configuration of an [`App`].
///
/// Settings apply in call order; the first invalid one is remembered and
/// returned by [`AppBuilder::build`], before anything listens.
#[derive(Debug)]
pub struct AppBuilder {
    addr: SocketAddr,
    binders: Vec<Box<dyn Binder>>,
    request_timeout: Option<Duration>,
    error: Option<AppError>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            binders: Vec::new(),
            request_timeout: None,
            error: None,
        }
    }
}

impl AppBuilder {
    /// Creates a builder with [`DEFAULT_ADDR`] and no binders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listen address. `localhost` resolves to `127.0.0.1`.
    #[must_use]
    pub fn address(mut self, host: &str, port: &str) -> Self {
        match parse_addr(host, port) {
            Ok(addr) => self.addr = addr,
            Err(err) => self.fail(err),
        }
        self
    }

    /// Sets the listen address from an already parsed socket address.
    #[must_use]
    pub fn socket_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Registers one more binder. Order determines registration order.
    #[must_use]
    pub fn binder(mut self, binder: impl Binder + 'static) -> Self {
        if self.binders.iter().any(|b| b.name() == binder.name()) {
            let name = binder.name().to_string();
            self.fail(AppError::DuplicateBinder(name));
            return self;
        }
        tracing::debug!(binder = binder.name(), "binder registered");
        self.binders.push(Box::new(binder));
        self
    }

    /// Bounds the time until a response starts; expiry yields a 500 envelope.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn fail(&mut self, err: AppError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Applies every binder to a fresh router and wraps it in the
    /// process-wide layers.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by a builder method.
    pub fn build(self) -> Result<App, AppError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut router = Router::new();
        for binder in &self.binders {
            tracing::info!(binder = binder.name(), "initialising binder");
            router = binder.bind(router);
        }
        router = router
            .fallback(route_not_found)
            .method_not_allowed_fallback(method_not_allowed);

        if let Some(timeout) = self.request_timeout {
            router = router.layer(middleware::from_fn_with_state(timeout, enforce_timeout));
        }
        let router = router
            .layer(CatchPanicLayer::custom(encode_panic))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        let (lifecycle, _) = watch::channel(Lifecycle::NotStarted);
        Ok(App {
            addr: self.addr,
            router,
            binders: self.binders,
            lifecycle,
        })
    }
}

/// A composed service, ready to listen.
#[derive(Debug)]
pub struct App {
    addr: SocketAddr,
    router: Router,
    binders: Vec<Box<dyn Binder>>,
    lifecycle: watch::Sender<Lifecycle>,
}

impl App {
    /// Shorthand for [`AppBuilder::new`].
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Configured listen address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Names of the registered binders, in registration order.
    #[must_use]
    pub fn binder_names(&self) -> Vec<&str> {
        self.binders.iter().map(|b| b.name()).collect()
    }

    /// A clone of the fully layered router, for in-process dispatch.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Subscribes to lifecycle transitions.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Binds the configured address and serves until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// [`AppError::Bind`] if the address cannot be bound, otherwise as
    /// [`App::serve`].
    pub async fn run<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` completes,
    /// then drains in-flight requests and closes every binder in order.
    ///
    /// # Errors
    ///
    /// [`AppError::Serve`] on a transport I/O failure, or
    /// [`AppError::Close`] for the first binder that fails to close.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            router,
            binders,
            lifecycle,
            ..
        } = self;

        let addr = listener.local_addr().map_err(AppError::Serve)?;
        lifecycle.send_replace(Lifecycle::Listening(addr));
        tracing::info!(%addr, "--- Starting Service ---");

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        match &served {
            Ok(()) => tracing::info!(%addr, "transport drained, shutting down"),
            Err(err) => tracing::error!(%addr, error = %err, "http transport failed"),
        }

        let mut close_error = None;
        for binder in &binders {
            if let Err(source) = binder.close().await {
                tracing::error!(binder = binder.name(), error = %source, "failed to close binder");
                if close_error.is_none() {
                    close_error = Some(AppError::Close {
                        name: binder.name().to_string(),
                        source,
                    });
                }
            }
        }
        lifecycle.send_replace(Lifecycle::Closed);

        served.map_err(AppError::Serve)?;
        close_error.map_or(Ok(()), Err)
    }
}

fn parse_addr(host: &str, port: &str) -> Result<SocketAddr, AppError> {
    let invalid = |reason: String| AppError::InvalidAddress {
        addr: format!("{host}:{port}"),
        reason,
    };
    let ip: IpAddr = match host.trim() {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .trim_matches(|c| c == '[' || c == ']')
            .parse()
            .map_err(|e| invalid(format!("host: {e}")))?,
    };
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|e| invalid(format!("port: {e}")))?;
    Ok(SocketAddr::new(ip, port))
}

async fn route_not_found(uri: Uri) -> Response {
    encode_error(&DomainError::not_found(format!("no route for {}", uri.path())))
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    let status = StatusCode::METHOD_NOT_ALLOWED;
    let envelope = ErrorEnvelope {
        message: "method not allowed".to_string(),
        code: status.as_u16(),
        error: format!("{method} is not allowed on {}", uri.path()),
    };
    (status, Json(envelope)).into_response()
}

async fn enforce_timeout(State(timeout): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => encode_error(&DomainError::internal(format!(
            "request timed out after {timeout:?}"
        ))),
    }
}
