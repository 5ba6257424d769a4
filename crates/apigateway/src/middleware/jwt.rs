use axum::{
    Extension,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use shared::{abstract_trait::DynIdentityProvider, domain::Subject, errors::HttpError};
use tracing::debug;

/// Token from the `token` cookie, or from an `Authorization: Bearer` header.
pub fn bearer_token(cookie_jar: &CookieJar, req: &Request<Body>) -> Option<String> {
    cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(|token| token.trim().to_owned())
        })
        .filter(|token| !token.is_empty())
}

/// Attaches the [`Subject`] of a valid token to the request. Requests without
/// a token, or with a bad one, continue anonymously.
pub async fn identify_middleware(
    cookie_jar: CookieJar,
    Extension(identity): Extension<DynIdentityProvider>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&cookie_jar, &req) {
        match identity.verify_token(&token) {
            Ok(subject) => {
                req.extensions_mut().insert(subject);
            }
            Err(err) => debug!("Continuing anonymously: {err}"),
        }
    }

    next.run(req).await
}

pub async fn require_auth_middleware(
    cookie_jar: CookieJar,
    Extension(identity): Extension<DynIdentityProvider>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    if req.extensions().get::<Subject>().is_some() {
        return Ok(next.run(req).await);
    }

    let token = bearer_token(&cookie_jar, &req)
        .ok_or_else(|| HttpError::Unauthorized("Authentication required".to_string()))?;

    let subject = identity.verify_token(&token)?;
    req.extensions_mut().insert(subject);

    Ok(next.run(req).await)
}

#[derive(Debug, Clone, Copy)]
pub struct RequiredRole(pub &'static str);

pub async fn require_role_middleware(
    State(RequiredRole(role)): State<RequiredRole>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    let subject = req
        .extensions()
        .get::<Subject>()
        .ok_or_else(|| HttpError::Unauthorized("Authentication required".to_string()))?;

    if !subject.has_role(role) {
        debug!(subject = %subject.id, role, "Missing required role");
        return Err(HttpError::Forbidden("Insufficient permissions".to_string()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn token_from_header_or_cookie() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            bearer_token(&CookieJar::new(), &req).as_deref(),
            Some("abc.def")
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "token=from-cookie".parse().unwrap());
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(bearer_token(&jar, &req).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn non_bearer_header_is_ignored() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&CookieJar::new(), &req), None);

        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&CookieJar::new(), &req), None);
    }
}
