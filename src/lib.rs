//! # klg
//!
//! HTTP service scaffold that composes independent route-registration units
//! ("binders") onto one shared transport: a log-record CRUD API, a liveness
//! monitor, OpenAPI docs, and a catch-all reverse proxy to a single
//! downstream origin.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── App: CatchPanic, Trace, CORS, request timeout (app/)
//!     │
//!     ├── MonitorBinder   /pong, /monitor          (monitor)
//!     ├── CrudBinder      /v1.0/logs[/{id}]        (crud/)
//!     │       └── Pipeline: decode → call → encode (pipeline/)
//!     │               └── Service (service/)
//!     │                       ├── InMemoryService
//!     │                       └── PostgresService
//!     ├── DocsBinder      /api-docs, /swagger-ui   (docs)
//!     └── ProxyBinder     /, /{*path}              (proxy/)
//!             └── Forwarder ──▶ downstream origin
//! ```
//!
//! Every failure on a CRUD route is a [`error::DomainError`] and becomes a
//! status code in exactly one place, [`pipeline::encode_error`].

pub mod app;
pub mod config;
pub mod crud;
pub mod docs;
pub mod domain;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod proxy;
pub mod service;
