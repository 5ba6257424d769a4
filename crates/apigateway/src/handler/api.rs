use crate::{
    domain::{
        requests::{CreateProductRequest, SearchQuery},
        response::{
            AdminStats, AdminStatsResponse, CurrentUserResponse, MessageResponse,
            ProductCreatedResponse, SearchResponse, SearchResult,
        },
    },
    middleware::{
        jwt::{RequiredRole, require_auth_middleware, require_role_middleware},
        rate_limit::{RateLimitRule, rate_limit_middleware},
        validate::SimpleValidatedJson,
    },
    state::AppState,
};
use axum::{
    Extension, Json,
    extract::Query,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use shared::{
    domain::Subject,
    errors::{ErrorResponse, HttpError, RateLimitError},
};
use utoipa_axum::router::OpenApiRouter;

pub async fn health_checker_handler() -> impl IntoResponse {
    Json(MessageResponse::success("Marketplace gateway is running"))
}

#[utoipa::path(
    get,
    path = "/api/public/hello",
    responses(
        (status = 200, description = "Greeting", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    tag = "Public"
)]
pub async fn public_hello() -> impl IntoResponse {
    Json(MessageResponse::success("Hello, world!"))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn get_me_handler(Extension(subject): Extension<Subject>) -> impl IntoResponse {
    Json(CurrentUserResponse::from(subject))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductCreatedResponse),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Seller role required", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Product"
)]
pub async fn create_product(
    SimpleValidatedJson(body): SimpleValidatedJson<CreateProductRequest>,
) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ProductCreatedResponse::from(body)))
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Search results", body = SearchResponse),
        (status = 400, description = "Missing query", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    tag = "Search"
)]
pub async fn search(Query(query): Query<SearchQuery>) -> Result<impl IntoResponse, HttpError> {
    if query.q.is_empty() {
        return Err(HttpError::MissingParameter(
            "Search query is required".to_string(),
        ));
    }

    let results = (1..=2)
        .map(|id| SearchResult {
            id,
            name: format!("Result for {} {id}", query.q),
        })
        .collect();

    Ok(Json(SearchResponse::new(query.q, results)))
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Marketplace statistics", body = AdminStatsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Admin"
)]
pub async fn admin_stats() -> impl IntoResponse {
    Json(AdminStatsResponse {
        status: "success".to_string(),
        stats: AdminStats {
            users: 1000,
            products: 5000,
            orders: 2500,
            revenue: 100_000.0,
        },
    })
}

/// Rate-limited marketplace routes. Limits are resolved here, so an unknown
/// category fails router construction.
pub fn api_routes(app_state: &AppState) -> Result<OpenApiRouter, RateLimitError> {
    let hello = RateLimitRule::endpoint("api.public.hello")
        .category("public", None)
        .build(app_state)?;
    let me = RateLimitRule::endpoint("api.auth.me")
        .category("api", Some("authenticated"))
        .build(app_state)?;
    let products = RateLimitRule::endpoint("api.v1.products.create")
        .max_requests(10)
        .per_seconds(60)
        .build(app_state)?;
    let search_limit = RateLimitRule::endpoint("search.query")
        .category("search", None)
        .build(app_state)?;
    let stats = RateLimitRule::endpoint("admin.stats")
        .category("admin", None)
        .build(app_state)?;

    let public_routes = OpenApiRouter::new()
        .route(
            "/api/public/hello",
            get(public_hello)
                .route_layer(middleware::from_fn_with_state(hello, rate_limit_middleware)),
        )
        .route(
            "/api/search",
            get(search).route_layer(middleware::from_fn_with_state(
                search_limit,
                rate_limit_middleware,
            )),
        );

    let private_routes = OpenApiRouter::new()
        .route(
            "/api/auth/me",
            get(get_me_handler)
                .route_layer(middleware::from_fn_with_state(me, rate_limit_middleware))
                .route_layer(middleware::from_fn(require_auth_middleware)),
        )
        .route(
            "/api/products",
            post(create_product)
                .route_layer(middleware::from_fn_with_state(
                    products,
                    rate_limit_middleware,
                ))
                .route_layer(middleware::from_fn_with_state(
                    RequiredRole("seller"),
                    require_role_middleware,
                ))
                .route_layer(middleware::from_fn(require_auth_middleware)),
        )
        .route(
            "/api/admin/stats",
            get(admin_stats)
                .route_layer(middleware::from_fn_with_state(stats, rate_limit_middleware))
                .route_layer(middleware::from_fn_with_state(
                    RequiredRole("admin"),
                    require_role_middleware,
                ))
                .route_layer(middleware::from_fn(require_auth_middleware)),
        );

    Ok(public_routes.merge(private_routes))
}
