//! Generic per-route request pipeline.
//!
//! A [`Pipeline`] is instantiated once per method/path and chains four
//! stages:
//!
//! ```text
//! Request ── read ──▶ RawRequest ── decode ──▶ Req ── call ──▶ Res ── encode ──▶ Response
//!                          │                     │               │
//!                          └──────── DomainError ┴───────────────┴──▶ encode_error
//! ```
//!
//! Decoders are pure functions of the buffered request and never touch a
//! service. The call stage never maps errors to status codes; only
//! [`encode_error`] does, and it is shared by every route.

mod encode;

use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter, on};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

pub use encode::{encode_error, encode_json, encode_no_content, encode_panic};

use crate::error::DomainError;

/// Largest request body a pipeline buffers before decoding (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Buffered view of an inbound request handed to decoders.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// Request method.
    pub method: Method,
    /// Full request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Path parameters captured by the route pattern.
    pub params: Vec<(String, String)>,
    /// Complete request body.
    pub body: Bytes,
}

impl RawRequest {
    /// Splits and buffers `req`, capturing its path parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BadRequest`] if the body exceeds `limit` or
    /// cannot be read.
    pub async fn read(req: Request, limit: usize) -> Result<Self, DomainError> {
        let (mut parts, body) = req.into_parts();
        let params = RawPathParams::from_request_parts(&mut parts, &())
            .await
            .map(|raw| {
                raw.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| DomainError::bad_request(format!("failed to read request body: {e}")))?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            body,
        })
    }

    /// Builds a request directly, mainly for exercising decoders.
    #[must_use]
    pub fn new(method: Method, uri: Uri, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a path parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Adds a header, ignoring values that are not valid header text.
    #[must_use]
    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = header::HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns the path parameter `name`, if captured.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the decoded query string pairs in order of appearance.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the media type of the body without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
    }
}

/// Decode stage: raw request to typed request value.
pub type Decoder<Req> = fn(&RawRequest) -> Result<Req, DomainError>;

/// Encode stage: domain result to HTTP response.
pub type Encoder<Res> = fn(Res) -> Result<Response, DomainError>;

type Endpoint<Req, Res> =
    Arc<dyn Fn(Req) -> BoxFuture<'static, Result<Res, DomainError>> + Send + Sync>;

/// Decode → call → encode chain bound to one route.
pub struct Pipeline<Req, Res> {
    name: &'static str,
    decode: Decoder<Req>,
    call: Endpoint<Req, Res>,
    encode: Encoder<Res>,
    body_limit: usize,
}

impl<Req, Res> std::fmt::Debug for Pipeline<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl<Req, Res> Pipeline<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Assembles a pipeline from its stages.
    pub fn new<F, Fut>(name: &'static str, decode: Decoder<Req>, call: F, encode: Encoder<Res>) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, DomainError>> + Send + 'static,
    {
        Self {
            name,
            decode,
            call: Arc::new(move |req| call(req).boxed()),
            encode,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Overrides [`DEFAULT_BODY_LIMIT`].
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Returns the route name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the full chain; every failure goes through [`encode_error`].
    pub async fn handle(&self, req: Request<Body>) -> Response {
        match self.run(req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(route = self.name, error = %err, "request failed");
                encode_error(&err)
            }
        }
    }

    async fn run(&self, req: Request<Body>) -> Result<Response, DomainError> {
        let raw = RawRequest::read(req, self.body_limit).await?;
        let decoded = (self.decode)(&raw)?;
        let result = (self.call)(decoded).await?;
        (self.encode)(result)
    }

    /// Turns the pipeline into a method router answering `filter`.
    pub fn on(self, filter: MethodFilter) -> MethodRouter {
        let pipeline = Arc::new(self);
        on(filter, move |req: Request| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.handle(req).await }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn decode_number(raw: &RawRequest) -> Result<i64, DomainError> {
        let text = std::str::from_utf8(&raw.body)
            .map_err(|_| DomainError::bad_request("body is not utf-8"))?;
        text.trim()
            .parse()
            .map_err(|_| DomainError::bad_request(format!("not a number: {text}")))
    }

    fn doubling_router() -> Router {
        let pipeline = Pipeline::new(
            "double",
            decode_number,
            |n: i64| async move {
                if n < 0 {
                    Err(DomainError::validation("negative input"))
                } else {
                    Ok(n * 2)
                }
            },
            encode_json::<i64>,
        );
        Router::new().route("/double", pipeline.on(MethodFilter::POST))
    }

    async fn post(router: Router, body: &'static str) -> (StatusCode, Bytes) {
        let Ok(req) = axum::http::Request::post("/double").body(Body::from(body)) else {
            panic!("request builds");
        };
        let Ok(res) = router.oneshot(req).await else {
            panic!("router is infallible");
        };
        let status = res.status();
        let Ok(bytes) = axum::body::to_bytes(res.into_body(), usize::MAX).await else {
            panic!("body readable");
        };
        (status, bytes)
    }

    #[tokio::test]
    async fn success_runs_every_stage() {
        let (status, body) = post(doubling_router(), "21").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"42");
    }

    #[tokio::test]
    async fn decode_error_short_circuits() {
        let (status, body) = post(doubling_router(), "abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        assert_eq!(json["Message"], "bad request");
        assert_eq!(json["Code"], 400);
    }

    #[tokio::test]
    async fn call_error_keeps_its_category() {
        let (status, body) = post(doubling_router(), "-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        assert_eq!(json["Message"], "Bad Request, required fields missing");
        assert_eq!(json["Error"], "negative input");
    }

    #[tokio::test]
    async fn oversized_body_is_bad_request() {
        let pipeline = Pipeline::new(
            "tiny",
            decode_number,
            |n: i64| async move { Ok(n) },
            encode_json::<i64>,
        )
        .with_body_limit(2);
        let router = Router::new().route("/double", pipeline.on(MethodFilter::POST));
        let (status, _) = post(router, "12345").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn raw_request_helpers() {
        let Ok(uri) = "/v1.0/logs?level=info&service=a%20b".parse::<Uri>() else {
            panic!("valid uri");
        };
        let raw = RawRequest::new(Method::GET, uri, Bytes::new())
            .with_param("id", "abc")
            .with_header(header::CONTENT_TYPE, "application/JSON; charset=utf-8");
        assert_eq!(raw.param("id"), Some("abc"));
        assert_eq!(raw.param("other"), None);
        assert_eq!(
            raw.query_pairs(),
            vec![
                ("level".to_string(), "info".to_string()),
                ("service".to_string(), "a b".to_string()),
            ]
        );
        assert_eq!(raw.content_type().as_deref(), Some("application/json"));
    }
}
