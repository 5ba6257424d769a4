use crate::{
    domain::{RateLimit, RateLimitDecision},
    errors::RateLimitError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type DynRateLimiter = Arc<dyn RateLimiterTrait + Send + Sync>;

pub trait RateLimiterTrait: Send + Sync {
    /// Admit or reject one request for `key` against `limit` at the injected clock's time.
    fn check_and_consume(
        &self,
        key: &str,
        limit: RateLimit,
    ) -> Result<RateLimitDecision, RateLimitError>;

    /// Same as [`check_and_consume`](Self::check_and_consume) with an explicit timestamp.
    fn check_and_consume_at(
        &self,
        key: &str,
        limit: RateLimit,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitError>;

    fn remaining(&self, key: &str, limit: RateLimit) -> u32;
    fn reset(&self, key: &str) -> bool;
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
