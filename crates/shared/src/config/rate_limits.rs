use crate::{
    domain::{RateLimit, LimitConfig},
    errors::RateLimitError,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::info;

const DEFAULT_SUBCATEGORY: &str = "default";

/// A category is either a single limit or a table of named subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryConfig {
    Flat(LimitConfig),
    Nested(BTreeMap<String, LimitConfig>),
}

/// Maps an endpoint name pattern to a category. Patterns ending in `.` match
/// by prefix, anything else must match the endpoint name exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRuleConfig {
    pub pattern: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

/// On-disk shape of the rate limit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub categories: BTreeMap<String, CategoryConfig>,
    #[serde(default)]
    pub endpoints: Vec<EndpointRuleConfig>,
    #[serde(default = "fallback_limit")]
    pub default: LimitConfig,
}

fn fallback_limit() -> LimitConfig {
    LimitConfig {
        limit: 100,
        window_seconds: 60,
    }
}

fn limit_config(limit: u32, window_seconds: u64) -> LimitConfig {
    LimitConfig {
        limit,
        window_seconds,
    }
}

fn rule(pattern: &str, category: &str, subcategory: Option<&str>) -> EndpointRuleConfig {
    EndpointRuleConfig {
        pattern: pattern.to_string(),
        category: category.to_string(),
        subcategory: subcategory.map(str::to_string),
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut categories = BTreeMap::new();

        categories.insert("public".into(), CategoryConfig::Flat(limit_config(100, 60)));
        categories.insert(
            "auth".into(),
            CategoryConfig::Nested(BTreeMap::from([
                ("login".into(), limit_config(5, 60)),
                ("register".into(), limit_config(3, 60)),
                ("password_reset".into(), limit_config(3, 60)),
            ])),
        );
        categories.insert(
            "api".into(),
            CategoryConfig::Nested(BTreeMap::from([
                ("default".into(), limit_config(1000, 3600)),
                ("public".into(), limit_config(100, 60)),
                ("authenticated".into(), limit_config(500, 300)),
            ])),
        );
        categories.insert("sensitive".into(), CategoryConfig::Flat(limit_config(10, 60)));
        categories.insert("uploads".into(), CategoryConfig::Flat(limit_config(20, 300)));
        categories.insert("admin".into(), CategoryConfig::Flat(limit_config(200, 60)));
        categories.insert("search".into(), CategoryConfig::Flat(limit_config(30, 60)));

        let endpoints = vec![
            rule("auth.login", "auth", Some("login")),
            rule("auth.register", "auth", Some("register")),
            rule("auth.forgot_password", "auth", Some("password_reset")),
            rule("auth.reset_password", "auth", Some("password_reset")),
            rule("api.v1.", "api", Some("default")),
            rule("api.public.", "api", Some("public")),
            rule("admin.", "admin", None),
            rule("upload.", "uploads", None),
            rule("search.", "search", None),
        ];

        Self {
            categories,
            endpoints,
            default: fallback_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CategoryLimits {
    Flat(RateLimit),
    Nested(BTreeMap<String, RateLimit>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EndpointRule {
    pattern: String,
    limit: RateLimit,
}

impl EndpointRule {
    fn matches(&self, endpoint: &str) -> bool {
        if self.pattern.ends_with('.') {
            endpoint.starts_with(&self.pattern)
        } else {
            endpoint == self.pattern
        }
    }
}

/// Validated, immutable rate limit table. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    categories: BTreeMap<String, CategoryLimits>,
    endpoints: Vec<EndpointRule>,
    default: RateLimit,
}

fn invalid(context: impl std::fmt::Display, err: RateLimitError) -> RateLimitError {
    match err {
        RateLimitError::InvalidConfiguration(msg) => {
            RateLimitError::InvalidConfiguration(format!("{context}: {msg}"))
        }
        other => RateLimitError::InvalidConfiguration(format!("{context}: {other}")),
    }
}

impl RateLimitPolicy {
    pub fn builtin() -> Result<Self, RateLimitError> {
        Self::from_config(RateLimitConfig::default())
    }

    pub fn from_config(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        let mut categories = BTreeMap::new();

        for (name, category) in config.categories {
            let limits = match category {
                CategoryConfig::Flat(raw) => CategoryLimits::Flat(
                    RateLimit::try_from(raw).map_err(|e| invalid(format!("category '{name}'"), e))?,
                ),
                CategoryConfig::Nested(table) => {
                    if table.is_empty() {
                        return Err(RateLimitError::InvalidConfiguration(format!(
                            "category '{name}' has no subcategories"
                        )));
                    }

                    let mut subs = BTreeMap::new();
                    for (sub, raw) in table {
                        let limit = RateLimit::try_from(raw)
                            .map_err(|e| invalid(format!("category '{name}.{sub}'"), e))?;
                        subs.insert(sub, limit);
                    }
                    CategoryLimits::Nested(subs)
                }
            };
            categories.insert(name, limits);
        }

        let default = RateLimit::try_from(config.default).map_err(|e| invalid("default", e))?;

        let mut policy = Self {
            categories,
            endpoints: Vec::with_capacity(config.endpoints.len()),
            default,
        };

        for rule in config.endpoints {
            if rule.pattern.is_empty() {
                return Err(RateLimitError::InvalidConfiguration(
                    "endpoint pattern must not be empty".into(),
                ));
            }

            let limit = policy
                .resolve_limit(&rule.category, rule.subcategory.as_deref())
                .map_err(|e| invalid(format!("endpoint rule '{}'", rule.pattern), e))?;

            policy.endpoints.push(EndpointRule {
                pattern: rule.pattern,
                limit,
            });
        }

        Ok(policy)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: RateLimitConfig =
            serde_json::from_str(raw).context("Failed to parse rate limit configuration")?;
        Ok(Self::from_config(config)?)
    }

    /// Loads the table from `path` when given, otherwise the built-in table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read rate limit configuration {}", path.display())
                })?;
                let policy = Self::from_json(&raw)?;
                info!(
                    path = %path.display(),
                    categories = policy.categories.len(),
                    endpoints = policy.endpoints.len(),
                    "Loaded rate limit configuration"
                );
                Ok(policy)
            }
            None => Ok(Self::builtin()?),
        }
    }

    /// Looks up a category, falling back to its `default` subcategory when the
    /// requested one is missing.
    pub fn resolve_limit(
        &self,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<RateLimit, RateLimitError> {
        let limits = self
            .categories
            .get(category)
            .ok_or_else(|| RateLimitError::UnknownCategory(category.to_string()))?;

        match limits {
            CategoryLimits::Flat(limit) => Ok(*limit),
            CategoryLimits::Nested(table) => subcategory
                .and_then(|sub| table.get(sub))
                .or_else(|| table.get(DEFAULT_SUBCATEGORY))
                .copied()
                .ok_or_else(|| RateLimitError::UnknownSubcategory {
                    category: category.to_string(),
                    subcategory: subcategory.unwrap_or("<none>").to_string(),
                }),
        }
    }

    /// Longest matching endpoint pattern wins; unmatched endpoints get the
    /// global default.
    pub fn resolve_endpoint(&self, endpoint: &str) -> RateLimit {
        let mut best: Option<&EndpointRule> = None;

        for rule in self.endpoints.iter().filter(|r| r.matches(endpoint)) {
            if best.is_none_or(|b| rule.pattern.len() > b.pattern.len()) {
                best = Some(rule);
            }
        }

        best.map(|r| r.limit).unwrap_or(self.default)
    }

    pub fn default_limit(&self) -> RateLimit {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abstract_trait::RateLimiterTrait, cache::RateLimiter, domain::MAX_WINDOW_SECONDS};
    use chrono::Utc;

    fn limit(limit: u32, window: u64) -> RateLimit {
        RateLimit::new(limit, window).unwrap()
    }

    #[test]
    fn builtin_table_values() {
        let policy = RateLimitPolicy::builtin().unwrap();

        assert_eq!(policy.resolve_limit("public", None).unwrap(), limit(100, 60));
        assert_eq!(policy.resolve_limit("auth", Some("login")).unwrap(), limit(5, 60));
        assert_eq!(
            policy.resolve_limit("api", Some("default")).unwrap(),
            limit(1000, 3600)
        );
        assert_eq!(policy.resolve_limit("sensitive", None).unwrap(), limit(10, 60));
        assert_eq!(policy.resolve_limit("uploads", None).unwrap(), limit(20, 300));
        assert_eq!(policy.resolve_limit("admin", None).unwrap(), limit(200, 60));
        assert_eq!(policy.resolve_limit("search", None).unwrap(), limit(30, 60));
    }

    #[test]
    fn resolve_limit_is_pure() {
        let policy = RateLimitPolicy::builtin().unwrap();
        let snapshot = policy.clone();

        let first = policy.resolve_limit("api", Some("authenticated"));
        let second = policy.resolve_limit("api", Some("authenticated"));

        assert_eq!(first, second);
        assert_eq!(policy, snapshot);
    }

    #[test]
    fn unknown_subcategory_uses_category_default() {
        let policy = RateLimitPolicy::builtin().unwrap();

        assert_eq!(
            policy.resolve_limit("api", Some("graphql")).unwrap(),
            limit(1000, 3600)
        );
        assert_eq!(policy.resolve_limit("api", None).unwrap(), limit(1000, 3600));
    }

    #[test]
    fn unknown_subcategory_without_default_fails() {
        let policy = RateLimitPolicy::builtin().unwrap();

        assert_eq!(
            policy.resolve_limit("auth", Some("oauth")),
            Err(RateLimitError::UnknownSubcategory {
                category: "auth".into(),
                subcategory: "oauth".into(),
            })
        );
    }

    #[test]
    fn unknown_category_is_an_error_not_a_default() {
        let policy = RateLimitPolicy::builtin().unwrap();

        assert_eq!(
            policy.resolve_limit("nonexistent", None),
            Err(RateLimitError::UnknownCategory("nonexistent".into()))
        );
    }

    #[test]
    fn flat_category_ignores_subcategory() {
        let policy = RateLimitPolicy::builtin().unwrap();
        assert_eq!(
            policy.resolve_limit("search", Some("products")).unwrap(),
            limit(30, 60)
        );
    }

    #[test]
    fn endpoint_resolution_uses_exact_and_prefix_rules() {
        let policy = RateLimitPolicy::builtin().unwrap();

        assert_eq!(policy.resolve_endpoint("auth.login"), limit(5, 60));
        assert_eq!(policy.resolve_endpoint("auth.reset_password"), limit(3, 60));
        assert_eq!(policy.resolve_endpoint("api.v1.products.create"), limit(1000, 3600));
        assert_eq!(policy.resolve_endpoint("api.public.hello"), limit(100, 60));
        assert_eq!(policy.resolve_endpoint("admin.stats"), limit(200, 60));
        assert_eq!(policy.resolve_endpoint("search.query"), limit(30, 60));

        // exact patterns do not act as prefixes
        assert_eq!(policy.resolve_endpoint("auth.login.sso"), limit(100, 60));
        assert_eq!(policy.resolve_endpoint("marketplace.index"), limit(100, 60));
    }

    #[test]
    fn longest_prefix_wins_regardless_of_order() {
        let config = RateLimitConfig {
            categories: BTreeMap::from([
                ("broad".into(), CategoryConfig::Flat(limit_config(50, 60))),
                ("narrow".into(), CategoryConfig::Flat(limit_config(5, 60))),
            ]),
            endpoints: vec![
                rule("api.", "broad", None),
                rule("api.v1.orders.", "narrow", None),
            ],
            default: fallback_limit(),
        };
        let policy = RateLimitPolicy::from_config(config).unwrap();

        assert_eq!(policy.resolve_endpoint("api.v1.orders.create"), limit(5, 60));
        assert_eq!(policy.resolve_endpoint("api.v1.products"), limit(50, 60));
    }

    #[test]
    fn loads_nested_and_flat_categories_from_json() {
        let raw = r#"{
            "categories": {
                "public": { "limit": 10, "window_seconds": 30 },
                "auth": {
                    "login": { "limit": 2, "window_seconds": 60 }
                }
            },
            "endpoints": [
                { "pattern": "auth.login", "category": "auth", "subcategory": "login" }
            ],
            "default": { "limit": 7, "window_seconds": 15 }
        }"#;

        let policy = RateLimitPolicy::from_json(raw).unwrap();

        assert_eq!(policy.resolve_limit("public", None).unwrap(), limit(10, 30));
        assert_eq!(policy.resolve_endpoint("auth.login"), limit(2, 60));
        assert_eq!(policy.resolve_endpoint("anything.else"), limit(7, 15));
    }

    #[test]
    fn zero_limit_in_config_is_rejected() {
        let raw = r#"{ "categories": { "public": { "limit": 0, "window_seconds": 60 } } }"#;

        let err = RateLimitPolicy::from_json(raw).unwrap_err();
        let err = err.downcast::<RateLimitError>().unwrap();
        assert!(matches!(err, RateLimitError::InvalidConfiguration(msg) if msg.contains("public")));
    }

    #[test]
    fn endpoint_rule_with_unknown_category_is_rejected() {
        let config = RateLimitConfig {
            categories: BTreeMap::from([("public".into(), CategoryConfig::Flat(limit_config(1, 1)))]),
            endpoints: vec![rule("search.", "search", None)],
            default: fallback_limit(),
        };

        assert!(matches!(
            RateLimitPolicy::from_config(config),
            Err(RateLimitError::InvalidConfiguration(msg)) if msg.contains("search.")
        ));
    }

    #[test]
    fn overlarge_window_is_rejected_at_load() {
        let raw = r#"{ "categories": { "public": { "limit": 5, "window_seconds": 10000000000000 } } }"#;

        let err = RateLimitPolicy::from_json(raw).unwrap_err();
        let err = err.downcast::<RateLimitError>().unwrap();
        assert!(matches!(err, RateLimitError::InvalidConfiguration(msg) if msg.contains("public")));

        let raw = r#"{ "categories": {}, "default": { "limit": 5, "window_seconds": 18446744073709551615 } }"#;
        assert!(RateLimitPolicy::from_json(raw).is_err());
    }

    #[test]
    fn largest_accepted_values_are_usable() {
        let raw = format!(
            r#"{{ "categories": {{ "bulk": {{ "limit": {}, "window_seconds": {} }} }} }}"#,
            u32::MAX,
            MAX_WINDOW_SECONDS
        );
        let policy = RateLimitPolicy::from_json(&raw).unwrap();
        let bulk = policy.resolve_limit("bulk", None).unwrap();
        assert_eq!(bulk, limit(u32::MAX, MAX_WINDOW_SECONDS));

        let limiter = RateLimiter::new();
        let now = Utc::now();
        let decision = limiter.check_and_consume_at("k", bulk, now).unwrap();
        assert_eq!(decision.remaining(), u32::MAX - 1);
        assert_eq!(
            decision.reset_at(),
            now + chrono::Duration::seconds(MAX_WINDOW_SECONDS as i64)
        );
    }

    #[test]
    fn nested_table_may_use_field_names_as_subcategories() {
        let raw = r#"{
            "categories": {
                "odd": {
                    "limit": { "limit": 1, "window_seconds": 60 },
                    "window_seconds": { "limit": 2, "window_seconds": 120 }
                }
            }
        }"#;

        let policy = RateLimitPolicy::from_json(raw).unwrap();

        assert_eq!(policy.resolve_limit("odd", Some("limit")).unwrap(), limit(1, 60));
        assert_eq!(
            policy.resolve_limit("odd", Some("window_seconds")).unwrap(),
            limit(2, 120)
        );
    }

    #[test]
    fn missing_file_fails_with_context() {
        let err = RateLimitPolicy::load(Some(Path::new("/nonexistent/rate_limits.json")))
            .unwrap_err();
        assert!(err.to_string().contains("rate limit configuration"));
    }
}
