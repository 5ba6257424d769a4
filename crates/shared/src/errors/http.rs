use crate::errors::{
    auth::AuthError, error::ErrorResponse, rate_limit::RateLimitError,
};
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Detail of an internal error, carried as a response extension so that a
/// development-mode layer can surface it.
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    InvalidContentType(String),
    MissingParameter(String),
    Validation { message: String, details: Value },
    Unauthorized(String),
    Auth(AuthError),
    Forbidden(String),
    NotFound(String),
    TooManyRequests {
        retry_after: u64,
        limit: u32,
        reset_at: i64,
    },
    ServiceUnavailable(String),
    Internal(String),
}

impl From<AuthError> for HttpError {
    fn from(err: AuthError) -> Self {
        HttpError::Auth(err)
    }
}

impl From<RateLimitError> for HttpError {
    fn from(err: RateLimitError) -> Self {
        HttpError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::Internal(format!("{err:#}"))
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_)
            | HttpError::InvalidContentType(_)
            | HttpError::MissingParameter(_)
            | HttpError::Validation { .. } => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) | HttpError::Auth(_) => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            HttpError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HttpError::BadRequest(_) => "bad_request",
            HttpError::InvalidContentType(_) => "invalid_content_type",
            HttpError::MissingParameter(_) => "missing_query_parameter",
            HttpError::Validation { .. } => "validation_error",
            HttpError::Unauthorized(_) => "authentication_required",
            HttpError::Auth(err) => err.kind(),
            HttpError::Forbidden(_) => "insufficient_permissions",
            HttpError::NotFound(_) => "not_found",
            HttpError::TooManyRequests { .. } => "rate_limit_exceeded",
            HttpError::ServiceUnavailable(_) => "service_unavailable",
            HttpError::Internal(_) => "internal_server_error",
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let mut headers = HeaderMap::new();
        let mut detail = None;

        let body = match self {
            HttpError::BadRequest(msg)
            | HttpError::InvalidContentType(msg)
            | HttpError::MissingParameter(msg)
            | HttpError::Forbidden(msg)
            | HttpError::NotFound(msg)
            | HttpError::ServiceUnavailable(msg) => ErrorResponse::new(status.as_u16(), kind, msg),

            HttpError::Validation { message, details } => {
                ErrorResponse::new(status.as_u16(), kind, message).with_details(details)
            }

            HttpError::Unauthorized(msg) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                ErrorResponse::new(status.as_u16(), kind, msg)
            }

            HttpError::Auth(err) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                ErrorResponse::new(status.as_u16(), kind, err.to_string())
            }

            HttpError::TooManyRequests {
                retry_after,
                limit,
                reset_at,
            } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(0u32));
                headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at));

                ErrorResponse::new(
                    status.as_u16(),
                    kind,
                    format!("Too many requests. Please try again in {retry_after} seconds."),
                )
                .with_retry_after(retry_after)
            }

            HttpError::Internal(msg) => {
                error!("Internal server error: {msg}");
                detail = Some(InternalErrorDetail(msg));
                ErrorResponse::new(status.as_u16(), kind, INTERNAL_ERROR_MESSAGE)
            }
        };

        let mut response = (status, headers, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_carries_retry_headers() {
        let response = HttpError::TooManyRequests {
            retry_after: 42,
            limit: 5,
            reset_at: 1_700_000_000,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[header::RETRY_AFTER], "42");
        assert_eq!(headers["x-ratelimit-limit"], "5");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "1700000000");
    }

    #[test]
    fn internal_error_hides_detail_in_body() {
        let response = HttpError::Internal("connection refused".into()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response
            .extensions()
            .get::<InternalErrorDetail>()
            .expect("detail extension");
        assert_eq!(detail.0, "connection refused");
    }

    #[test]
    fn auth_errors_map_to_typed_kinds() {
        assert_eq!(HttpError::from(AuthError::ExpiredToken).kind(), "expired_token");
        assert_eq!(HttpError::from(AuthError::RevokedToken).kind(), "revoked_token");
        assert_eq!(
            HttpError::from(AuthError::MissingToken).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
