//! Liveness endpoints.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::Binder;

/// Default liveness paths.
pub const DEFAULT_MONITOR_PATHS: [&str; 2] = ["/pong", "/monitor"];

/// Liveness response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /pong`, `GET /monitor`: Process liveness.
#[utoipa::path(
    get,
    path = "/monitor",
    tag = "System",
    summary = "Liveness check",
    description = "Returns 200 while the process is serving. Also mounted on every other configured monitor path.",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Mounts [`health_handler`] on a list of paths.
#[derive(Debug, Clone)]
pub struct MonitorBinder {
    paths: Vec<String>,
}

impl MonitorBinder {
    /// Binder for `paths`. Blank entries are dropped and a missing leading
    /// `/` is added.
    #[must_use]
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            let path = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            };
            if !normalized.contains(&path) {
                normalized.push(path);
            }
        }
        Self { paths: normalized }
    }

    /// The mounted paths.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Default for MonitorBinder {
    fn default() -> Self {
        Self::new(DEFAULT_MONITOR_PATHS)
    }
}

impl Binder for MonitorBinder {
    fn name(&self) -> &str {
        "monitor"
    }

    fn bind(&self, router: Router) -> Router {
        self.paths
            .iter()
            .fold(router, |router, path| router.route(path, get(health_handler)))
    }
}
