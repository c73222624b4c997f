//! OpenAPI document and, with the `swagger-ui` feature, Swagger UI.

use axum::Router;
use utoipa::OpenApi;

use crate::app::Binder;
use crate::crud::CreateResponse;
use crate::domain::{LogLevel, NewRecord, Record};
use crate::error::ErrorEnvelope;
use crate::monitor::HealthResponse;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Path of the Swagger UI.
#[cfg(feature = "swagger-ui")]
pub const SWAGGER_UI_PATH: &str = "/swagger-ui";

/// OpenAPI description of the CRUD and monitor routes.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "klg",
        description = "Log-record CRUD API. Unmatched paths are relayed to the configured downstream."
    ),
    paths(
        crate::crud::transport::create_record,
        crate::crud::transport::get_record,
        crate::crud::transport::list_records,
        crate::crud::transport::delete_records,
        crate::monitor::health_handler,
    ),
    components(schemas(
        Record,
        NewRecord,
        LogLevel,
        CreateResponse,
        ErrorEnvelope,
        HealthResponse
    )),
    tags(
        (name = "Logs", description = "Log record storage"),
        (name = "System", description = "Liveness"),
    )
)]
pub struct ApiDoc;

/// Serves [`ApiDoc`] at [`OPENAPI_PATH`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocsBinder;

impl Binder for DocsBinder {
    fn name(&self) -> &str {
        "docs"
    }

    #[cfg(feature = "swagger-ui")]
    fn bind(&self, router: Router) -> Router {
        use utoipa_swagger_ui::SwaggerUi;
        router.merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_PATH, ApiDoc::openapi()))
    }

    #[cfg(not(feature = "swagger-ui"))]
    fn bind(&self, router: Router) -> Router {
        use axum::Json;
        use axum::routing::get;
        let doc = ApiDoc::openapi();
        router.route(OPENAPI_PATH, get(move || async move { Json(doc) }))
    }
}
