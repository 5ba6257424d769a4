use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use shared::{
    abstract_trait::{DynIdentityProvider, DynRateLimiter},
    cache::RateLimiter,
    config::{Config, JwtConfig, RateLimitPolicy},
    utils::Metrics,
};
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub identity: DynIdentityProvider,
    pub rate_limiter: DynRateLimiter,
    pub rate_limit_policy: Arc<RateLimitPolicy>,
    pub rate_limit_enabled: bool,
    pub trust_forwarded_for: bool,
    pub registry: Arc<Mutex<Registry>>,
    pub metrics: Arc<Metrics>,
    pub is_dev: bool,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("identity", &self.identity)
            .field("rate_limiter", &"<dyn RateLimiter>")
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("is_dev", &self.is_dev)
            .finish()
    }
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let policy = RateLimitPolicy::load(config.rate_limit.config_path.as_deref())
            .context("Failed to load rate limit configuration")?;

        let identity = Arc::new(JwtConfig::new(&config.jwt_secret)) as DynIdentityProvider;
        let rate_limiter = Arc::new(RateLimiter::new()) as DynRateLimiter;

        info!(
            enabled = config.rate_limit.enabled,
            trust_forwarded_for = config.rate_limit.trust_forwarded_for,
            default = %policy.default_limit(),
            "Rate limiter initialized"
        );

        Ok(Self::with_components(config, identity, rate_limiter, policy))
    }

    pub fn with_components(
        config: &Config,
        identity: DynIdentityProvider,
        rate_limiter: DynRateLimiter,
        policy: RateLimitPolicy,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let mut registry = Registry::default();
        metrics.register(&mut registry);

        Self {
            identity,
            rate_limiter,
            rate_limit_policy: Arc::new(policy),
            rate_limit_enabled: config.rate_limit.enabled,
            trust_forwarded_for: config.rate_limit.trust_forwarded_for,
            registry: Arc::new(Mutex::new(registry)),
            metrics,
            is_dev: config.is_dev,
        }
    }
}
