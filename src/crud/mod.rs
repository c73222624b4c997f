//! Log-record CRUD routes.
//!
//! | Method   | Path               | Pipeline                             |
//! |----------|--------------------|--------------------------------------|
//! | `POST`   | `/v1.0/logs`       | [`decode_create`] → [`create_record`] |
//! | `GET`    | `/v1.0/logs`       | [`decode_list`] → [`list_records`]    |
//! | `DELETE` | `/v1.0/logs`       | [`decode_delete`] → [`delete_records`] |
//! | `GET`    | `/v1.0/logs/{id}`  | [`decode_id`] → [`get_record`]        |
//! | `DELETE` | `/v1.0/logs/{id}`  | [`decode_delete_by_path`] → [`delete_records`] |

pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::routing::MethodFilter;

pub use transport::{
    CreateResponse, LOG_PATH, LOGS_PATH, create_record, decode_create, decode_delete,
    decode_delete_by_path, decode_id, decode_list, delete_records, get_record, list_records,
};

use crate::app::Binder;
use crate::config::{StorageBackend, StorageConfig};
use crate::domain::{DeleteFilter, ListFilter, NewRecord, Record};
use crate::error::DomainError;
use crate::pipeline::{Pipeline, encode_json, encode_no_content};
use crate::service::{InMemoryService, PostgresService, Service};

/// Binder that owns a [`Service`] and exposes it under `/v1.0/logs`.
#[derive(Debug, Clone)]
pub struct CrudBinder {
    service: Arc<dyn Service>,
}

impl CrudBinder {
    /// Wraps an already-constructed service.
    #[must_use]
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self { service }
    }

    /// Binder over a fresh [`InMemoryService`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryService::new()))
    }

    /// Builds the backend selected by `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Internal`] if the PostgreSQL backend cannot
    /// connect or migrate.
    pub async fn connect(storage: &StorageConfig) -> Result<Self, DomainError> {
        match storage.backend {
            StorageBackend::Memory => {
                tracing::info!("using in-memory record store");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let service = PostgresService::connect(
                    &storage.database_url,
                    storage.max_connections,
                    storage.timeout,
                )
                .await?;
                Ok(Self::new(Arc::new(service)))
            }
        }
    }

    /// The service behind the routes.
    #[must_use]
    pub fn service(&self) -> Arc<dyn Service> {
        Arc::clone(&self.service)
    }
}

#[async_trait]
impl Binder for CrudBinder {
    fn name(&self) -> &str {
        "crud"
    }

    fn bind(&self, router: Router) -> Router {
        let create = {
            let svc = self.service();
            Pipeline::new(
                "create_log",
                decode_create,
                move |new: NewRecord| create_record(Arc::clone(&svc), new),
                encode_json::<CreateResponse>,
            )
        };
        let list = {
            let svc = self.service();
            Pipeline::new(
                "list_logs",
                decode_list,
                move |filter: ListFilter| list_records(Arc::clone(&svc), filter),
                encode_json::<Vec<Record>>,
            )
        };
        let delete = {
            let svc = self.service();
            Pipeline::new(
                "delete_logs",
                decode_delete,
                move |filter: DeleteFilter| delete_records(Arc::clone(&svc), filter),
                encode_no_content::<()>,
            )
        };
        let get = {
            let svc = self.service();
            Pipeline::new(
                "get_log",
                decode_id,
                move |id: String| get_record(Arc::clone(&svc), id),
                encode_json::<Record>,
            )
        };
        let delete_one = {
            let svc = self.service();
            Pipeline::new(
                "delete_log",
                decode_delete_by_path,
                move |filter: DeleteFilter| delete_records(Arc::clone(&svc), filter),
                encode_no_content::<()>,
            )
        };

        router
            .route(
                LOGS_PATH,
                create
                    .on(MethodFilter::POST)
                    .merge(list.on(MethodFilter::GET))
                    .merge(delete.on(MethodFilter::DELETE)),
            )
            .route(
                LOG_PATH,
                get.on(MethodFilter::GET)
                    .merge(delete_one.on(MethodFilter::DELETE)),
            )
    }

    async fn close(&self) -> Result<(), DomainError> {
        self.service.close().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::{StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn router() -> Router {
        CrudBinder::in_memory().bind(Router::new())
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let Ok(res) = router.clone().oneshot(req).await else {
            panic!("router is infallible");
        };
        let status = res.status();
        let Ok(bytes) = axum::body::to_bytes(res.into_body(), usize::MAX).await else {
            panic!("body readable");
        };
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_default()
        };
        (status, json)
    }

    fn post_json(body: &Value) -> Request<Body> {
        let Ok(req) = Request::post(LOGS_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("request builds");
        };
        req
    }

    fn bare(method: &str, uri: &str) -> Request<Body> {
        let Ok(req) = Request::builder().method(method).uri(uri).body(Body::empty()) else {
            panic!("request builds");
        };
        req
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let router = router();
        let (status, created) = send(
            &router,
            post_json(&json!({"level": "info", "message": "hello", "metadata": {"svc": "api"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["status"], "success");
        assert_eq!(created["message"], "Log entry created successfully");

        let Some(id) = created["data"]["id"].as_str() else {
            panic!("created record has an id");
        };
        let (status, fetched) = send(&router, bare("GET", &format!("{LOGS_PATH}/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["message"], "hello");
        assert_eq!(fetched["metadata"]["svc"], "api");
    }

    #[tokio::test]
    async fn empty_required_field_is_validation_error() {
        let router = router();
        let (status, body) = send(&router, post_json(&json!({"level": "", "message": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Message"], "Bad Request, required fields missing");
        assert_eq!(body["Code"], 400);
    }

    #[tokio::test]
    async fn level_reads_back_as_sent() {
        let router = router();
        for level in ["INFO", "Warning", "warning"] {
            let (status, body) =
                send(&router, post_json(&json!({"level": level, "message": "m"}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{level}");
            assert_eq!(body["Message"], "bad request");
        }

        let (status, created) =
            send(&router, post_json(&json!({"level": "warn", "message": "m"}))).await;
        assert_eq!(status, StatusCode::OK);
        let Some(id) = created["data"]["id"].as_str() else {
            panic!("created record has an id");
        };
        let (_, fetched) = send(&router, bare("GET", &format!("{LOGS_PATH}/{id}"))).await;
        assert_eq!(fetched["level"], "warn");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let router = router();
        let Ok(req) = Request::post(LOGS_PATH).body(Body::from("{")) else {
            panic!("request builds");
        };
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Message"], "bad request");
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let router = router();
        let missing = crate::domain::RecordId::generate();
        let (status, body) = send(&router, bare("GET", &format!("{LOGS_PATH}/{missing}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["Message"], "not found");

        let (status, _) = send(&router, bare("GET", &format!("{LOGS_PATH}/not-a-uuid"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let router = router();
        for (level, message) in [("info", "first"), ("error", "second"), ("info", "third")] {
            let (status, _) =
                send(&router, post_json(&json!({"level": level, "message": message}))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&router, bare("GET", &format!("{LOGS_PATH}?level=info"))).await;
        assert_eq!(status, StatusCode::OK);
        let Some(items) = body.as_array() else {
            panic!("list returns an array");
        };
        let messages: Vec<&str> = items.iter().filter_map(|r| r["message"].as_str()).collect();
        assert_eq!(messages, ["third", "first"]);

        let (_, body) = send(&router, bare("GET", &format!("{LOGS_PATH}?recent=1"))).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, _) = send(&router, bare("GET", &format!("{LOGS_PATH}?recent=abc"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_selectors() {
        let router = router();
        let (_, created) = send(&router, post_json(&json!({"level": "info", "message": "m"}))).await;
        let Some(id) = created["data"]["id"].as_str() else {
            panic!("created record has an id");
        };

        let (status, body) = send(&router, bare("DELETE", LOGS_PATH)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Message"], "bad request");

        let (status, body) =
            send(&router, bare("DELETE", &format!("{LOGS_PATH}?id={id}&before=1000"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Error"], "only one of id or before can be provided");

        let (_, listed) = send(&router, bare("GET", LOGS_PATH)).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, body) = send(&router, bare("DELETE", &format!("{LOGS_PATH}?id={id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = send(&router, bare("GET", &format!("{LOGS_PATH}/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_by_path_and_empty_cutoff() {
        let router = router();
        let (_, created) = send(&router, post_json(&json!({"level": "warn", "message": "m"}))).await;
        let Some(id) = created["data"]["id"].as_str() else {
            panic!("created record has an id");
        };
        let (status, _) = send(&router, bare("DELETE", &format!("{LOGS_PATH}/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&router, bare("DELETE", &format!("{LOGS_PATH}?before=1"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["Error"], "no logs found before the specified timestamp");
    }

    #[tokio::test]
    async fn close_delegates_to_service() {
        let binder = CrudBinder::in_memory();
        let router = binder.bind(Router::new());
        let (status, _) = send(&router, post_json(&json!({"level": "info", "message": "m"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(binder.close().await.is_ok());
        let Ok(all) = binder.service().list(&ListFilter::default()).await else {
            panic!("list after close");
        };
        assert!(all.is_empty());
    }
}
