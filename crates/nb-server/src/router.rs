//! Axum router construction.
//!
//! Builds the application router: the conversion API under `/api`, health,
//! metrics and the OpenAPI document, wrapped in the shared middleware stack.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::context::AppContext;
use crate::middleware::auth::auth_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Multipart framing allowance on top of the upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    info(title = "NodeBlack API", description = "Asynchronous file conversion service"),
    paths(
        routes::convert::submit_conversion,
        routes::status::get_status,
        routes::download::download,
        routes::formats::list_formats,
        routes::files::list_files,
        routes::files::api_test,
        routes::health::health_check,
    ),
    components(schemas(
        routes::convert::SubmitResponse,
        routes::formats::FormatsResponse,
        routes::formats::ConversionEntry,
        routes::formats::CapabilityStatus,
        routes::files::FilesResponse,
        routes::files::TestResponse,
        routes::files::StorageExists,
        routes::health::HealthResponse,
        crate::jobs::JobView,
        crate::jobs::FileEntry,
        crate::jobs::QueueStats,
        crate::jobs::JobCounts,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = usize::try_from(ctx.config.server.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Submission is the only authenticated route. Auth runs first so the
    // limiter can key on the accepted API key.
    let submit = Router::new()
        .route("/convert", post(routes::convert::submit_conversion))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(ctx.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let api = Router::new()
        .route("/status/{task_id}", get(routes::status::get_status))
        .route("/download/{task_id}", get(routes::download::download))
        .route("/formats", get(routes::formats::list_formats))
        .route("/files", get(routes::files::list_files))
        .route("/test", get(routes::files::api_test))
        .merge(submit);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_conversion_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/convert",
            "/api/status/{task_id}",
            "/api/download/{task_id}",
            "/api/formats",
            "/api/files",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_key"));
    }
}
