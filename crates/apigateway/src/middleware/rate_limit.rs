use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use shared::{
    abstract_trait::DynRateLimiter,
    config::RateLimitPolicy,
    domain::{RateLimit, RateLimitDecision, Subject},
    errors::{HttpError, RateLimitError},
    utils::{Metrics, Outcome},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;

/// How a route picks its limit. An explicit pair wins over an explicit
/// category, which wins over the endpoint table. A single explicit value
/// overrides only its half of the resolved pair.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    endpoint: String,
    category: Option<(String, Option<String>)>,
    max_requests: Option<u32>,
    per_seconds: Option<u64>,
}

impl RateLimitRule {
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            category: None,
            max_requests: None,
            per_seconds: None,
        }
    }

    pub fn category(mut self, category: &str, subcategory: Option<&str>) -> Self {
        self.category = Some((category.to_string(), subcategory.map(str::to_string)));
        self
    }

    pub fn max_requests(mut self, limit: u32) -> Self {
        self.max_requests = Some(limit);
        self
    }

    pub fn per_seconds(mut self, seconds: u64) -> Self {
        self.per_seconds = Some(seconds);
        self
    }

    pub fn resolve(&self, policy: &RateLimitPolicy) -> Result<RateLimit, RateLimitError> {
        if let (Some(limit), Some(per)) = (self.max_requests, self.per_seconds) {
            return RateLimit::new(limit, per);
        }

        let base = match &self.category {
            Some((category, subcategory)) => {
                policy.resolve_limit(category, subcategory.as_deref())?
            }
            None => policy.resolve_endpoint(&self.endpoint),
        };

        RateLimit::new(
            self.max_requests.unwrap_or(base.limit()),
            self.per_seconds.unwrap_or(base.window_seconds()),
        )
    }

    /// Resolves the limit against the state's policy. Called while the router
    /// is built, so configuration errors abort startup.
    pub fn build(self, state: &AppState) -> Result<RouteRateLimit, RateLimitError> {
        let limit = self.resolve(&state.rate_limit_policy)?;

        debug!(endpoint = %self.endpoint, %limit, "Resolved route rate limit");

        Ok(RouteRateLimit {
            endpoint: Arc::from(self.endpoint),
            limit,
            limiter: state.rate_limiter.clone(),
            metrics: state.metrics.clone(),
            enabled: state.rate_limit_enabled,
            trust_forwarded_for: state.trust_forwarded_for,
        })
    }
}

/// Per-route middleware state.
#[derive(Clone)]
pub struct RouteRateLimit {
    endpoint: Arc<str>,
    limit: RateLimit,
    limiter: DynRateLimiter,
    metrics: Arc<Metrics>,
    enabled: bool,
    trust_forwarded_for: bool,
}

impl RouteRateLimit {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }
}

fn header_str<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn forwarded_address(req: &Request<Body>) -> Option<String> {
    header_str(req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| header_str(req, "x-real-ip").map(str::to_string))
}

fn peer_address(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// The socket peer address. With `trust_forwarded_for`, the first
/// `X-Forwarded-For` hop or `X-Real-IP` is preferred over the peer.
pub fn client_address(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        forwarded_address(req)
    } else {
        None
    };

    forwarded
        .or_else(|| peer_address(req))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `user:{id}:{endpoint}` for authenticated requests, `ip:{addr}:{endpoint}` otherwise.
pub fn rate_limit_key(req: &Request<Body>, endpoint: &str, trust_forwarded_for: bool) -> String {
    match req.extensions().get::<Subject>() {
        Some(subject) => format!("user:{}:{endpoint}", subject.id),
        None => format!(
            "ip:{}:{endpoint}",
            client_address(req, trust_forwarded_for)
        ),
    }
}

pub async fn rate_limit_middleware(
    State(route): State<RouteRateLimit>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, HttpError> {
    if !route.enabled {
        return Ok(next.run(req).await);
    }

    let key = rate_limit_key(&req, &route.endpoint, route.trust_forwarded_for);

    match route.limiter.check_and_consume(&key, route.limit)? {
        RateLimitDecision::Admitted {
            limit,
            remaining,
            reset_at,
        } => {
            route.metrics.record_decision(&route.endpoint, Outcome::Admitted);

            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at.timestamp()));

            Ok(response)
        }
        RateLimitDecision::Rejected {
            limit,
            retry_after,
            reset_at,
        } => {
            route.metrics.record_decision(&route.endpoint, Outcome::Rejected);
            debug!(key = %key, retry_after, "Request rejected by rate limiter");

            Err(HttpError::TooManyRequests {
                retry_after,
                limit,
                reset_at: reset_at.timestamp(),
            })
        }
    }
}
