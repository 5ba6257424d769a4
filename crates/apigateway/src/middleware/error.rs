use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use shared::errors::{ErrorResponse, HttpError, INTERNAL_ERROR_MESSAGE, InternalErrorDetail};
use std::any::Any;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub struct ErrorDetails {
    pub expose: bool,
}

/// In development mode, adds the detail the failing handler recorded to the
/// 500 body.
pub async fn error_detail_middleware(
    State(details): State<ErrorDetails>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    if !details.expose || response.status() != StatusCode::INTERNAL_SERVER_ERROR {
        return response;
    }

    match response.extensions().get::<InternalErrorDetail>().cloned() {
        Some(InternalErrorDetail(detail)) => {
            let body = ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "internal_server_error",
                INTERNAL_ERROR_MESSAGE,
            )
            .with_details(json!({ "detail": detail }));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        None => response,
    }
}

/// Converts a handler panic into the standard 500 envelope.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic payload".to_string()
    };

    error!("Handler panicked: {detail}");
    HttpError::Internal(detail).into_response()
}
