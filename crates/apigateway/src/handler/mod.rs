mod api;

use crate::middleware::{
    error::{ErrorDetails, error_detail_middleware, handle_panic},
    jwt::identify_middleware,
};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    extract::{DefaultBodyLimit, State},
    http::header::CONTENT_TYPE,
    middleware,
    response::IntoResponse,
    routing::get,
};
use prometheus_client::encoding::text::encode;
use shared::errors::HttpError;
use shared::utils::shutdown_signal;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;
use utoipa::{Modify, OpenApi, openapi::security::SecurityScheme};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub use self::api::api_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::public_hello,
        api::get_me_handler,
        api::create_product,
        api::search,
        api::admin_stats,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Public", description = "Anonymous endpoints"),
        (name = "Auth", description = "Authenticated user endpoints"),
        (name = "Product", description = "Seller product endpoints"),
        (name = "Search", description = "Catalog search"),
        (name = "Admin", description = "Administration endpoints"),
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let mut buffer = String::new();

    let registry = state.registry.lock().await;

    encode(&mut buffer, &registry)
        .map_err(|e| HttpError::Internal(format!("Failed to encode metrics: {e}")))?;

    Ok((
        [(
            CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buffer,
    ))
}

pub struct AppRouter;

impl AppRouter {
    pub fn build(app_state: AppState) -> Result<Router> {
        let shared_state = Arc::new(app_state);

        let routes = api_routes(&shared_state).context("Failed to resolve route rate limits")?;

        let api_router = OpenApiRouter::with_openapi(ApiDoc::openapi())
            .route("/metrics", get(metrics_handler))
            .route("/api/healthchecker", get(api::health_checker_handler))
            .with_state(shared_state.clone())
            .merge(
                routes
                    .layer(middleware::from_fn(identify_middleware))
                    .layer(Extension(shared_state.identity.clone())),
            );

        let router_with_layers = api_router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(16 * 1024 * 1024));

        let (app_router, openapi) = router_with_layers.split_for_parts();

        let app = app_router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn_with_state(
                ErrorDetails {
                    expose: shared_state.is_dev,
                },
                error_detail_middleware,
            ))
            .layer(TraceLayer::new_for_http());

        Ok(app)
    }

    pub async fn serve(port: u16, app_state: AppState) -> Result<()> {
        let app = Self::build(app_state)?;

        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        info!("Server running on http://{}", listener.local_addr()?);
        info!("Swagger UI: http://localhost:{port}/swagger-ui");
        info!("Metrics: http://localhost:{port}/metrics");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

        Ok(())
    }
}
