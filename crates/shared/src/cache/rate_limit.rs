use crate::{
    abstract_trait::{Clock, RateLimiterTrait},
    domain::{RateLimit, RateLimitDecision, RateLimitEntry},
    errors::RateLimitError,
    utils::SystemClock,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, trace};

const DEFAULT_SWEEP_INTERVAL_SECS: i64 = 60;

/// Process-local fixed-window limiter keyed by `{identity}:{endpoint}`.
///
/// The check-then-increment step runs under the dashmap shard lock held by
/// the entry guard, so concurrent requests on the same key serialize there.
/// Expired entries are swept before a check at most once per sweep interval.
#[derive(Debug)]
pub struct RateLimiter<C: Clock = SystemClock> {
    entries: DashMap<String, RateLimitEntry>,
    clock: C,
    sweep_interval: Duration,
    last_sweep_ms: AtomicI64,
}

impl RateLimiter<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            sweep_interval: Duration::seconds(DEFAULT_SWEEP_INTERVAL_SECS),
            last_sweep_ms: AtomicI64::new(0),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| *e)
    }

    fn maybe_sweep(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep_ms.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last) < self.sweep_interval.num_milliseconds() {
            return;
        }

        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let removed = self.purge_expired(now);
            if removed > 0 {
                trace!(removed, "Swept expired rate limit entries");
            }
        }
    }
}

impl<C: Clock> RateLimiterTrait for RateLimiter<C> {
    fn check_and_consume(
        &self,
        key: &str,
        limit: RateLimit,
    ) -> Result<RateLimitDecision, RateLimitError> {
        self.check_and_consume_at(key, limit, self.clock.now())
    }

    fn check_and_consume_at(
        &self,
        key: &str,
        limit: RateLimit,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitError> {
        if key.is_empty() {
            return Err(RateLimitError::InvalidKey);
        }

        self.maybe_sweep(now);

        let max_requests = limit.limit();
        let mut entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| RateLimitEntry::open(now, limit));

        if entry.is_expired(now) {
            *entry = RateLimitEntry::open(now, limit);
        }

        if entry.count < max_requests {
            entry.count += 1;
            return Ok(RateLimitDecision::Admitted {
                limit: max_requests,
                remaining: max_requests - entry.count,
                reset_at: entry.window_expires_at,
            });
        }

        let retry_after = entry.retry_after(now);
        debug!(key, retry_after, "Rate limit exceeded");

        Ok(RateLimitDecision::Rejected {
            limit: max_requests,
            retry_after,
            reset_at: entry.window_expires_at,
        })
    }

    fn remaining(&self, key: &str, limit: RateLimit) -> u32 {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => limit.limit().saturating_sub(entry.count),
            _ => limit.limit(),
        }
    }

    fn reset(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MockClock;
    use chrono::TimeZone;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn limiter() -> (RateLimiter<MockClock>, MockClock) {
        let clock = MockClock::new(start());
        (RateLimiter::with_clock(clock.clone()), clock)
    }

    #[test]
    fn login_scenario_counts_down_then_rejects() {
        let (limiter, clock) = limiter();
        let login = RateLimit::new(5, 60).unwrap();
        let key = "ip:10.0.0.1:auth.login";

        let mut remaining = Vec::new();
        for _ in 0..5 {
            let decision = limiter.check_and_consume(key, login).unwrap();
            assert!(decision.is_admitted());
            remaining.push(decision.remaining());
            clock.advance(Duration::seconds(2));
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let sixth = limiter.check_and_consume(key, login).unwrap();
        assert!(!sixth.is_admitted());
        let retry_after = sixth.retry_after().unwrap();
        assert!(retry_after <= 60);
        assert_eq!(retry_after, 50);
    }

    #[test]
    fn window_resets_after_expiry() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(3, 60).unwrap();
        let t0 = start();

        for _ in 0..3 {
            assert!(limiter.check_and_consume_at("k", limit, t0).unwrap().is_admitted());
        }
        assert!(!limiter.check_and_consume_at("k", limit, t0).unwrap().is_admitted());

        let later = t0 + Duration::seconds(60) + Duration::milliseconds(1);
        let decision = limiter.check_and_consume_at("k", limit, later).unwrap();
        assert!(decision.is_admitted());
        assert_eq!(decision.remaining(), 2);
        assert_eq!(limiter.entry("k").unwrap().count, 1);
    }

    #[test]
    fn never_admits_beyond_limit_within_window() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(7, 30).unwrap();
        let t0 = start();

        let admitted = (0..25)
            .map(|i| t0 + Duration::seconds(i))
            .filter(|now| limiter.check_and_consume_at("k", limit, *now).unwrap().is_admitted())
            .count();

        assert_eq!(admitted, 7);
        assert_eq!(limiter.entry("k").unwrap().count, 7);
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(2, 60).unwrap();
        let t0 = start();

        for _ in 0..5 {
            let _ = limiter.check_and_consume_at("a", limit, t0).unwrap();
        }

        let b = limiter.check_and_consume_at("b", limit, t0).unwrap();
        assert!(b.is_admitted());
        assert_eq!(b.remaining(), 1);
        assert_eq!(limiter.entry("a").unwrap().count, 2);
    }

    #[test]
    fn retry_after_decreases_within_window() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(1, 60).unwrap();
        let t0 = start();

        limiter.check_and_consume_at("k", limit, t0).unwrap();

        let first = limiter
            .check_and_consume_at("k", limit, t0 + Duration::seconds(5))
            .unwrap()
            .retry_after()
            .unwrap();
        let second = limiter
            .check_and_consume_at("k", limit, t0 + Duration::seconds(40))
            .unwrap()
            .retry_after()
            .unwrap();

        assert!(first >= second);
        assert_eq!(first, 55);
        assert_eq!(second, 20);
    }

    #[test]
    fn rejection_leaves_entry_untouched() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(1, 60).unwrap();
        let t0 = start();

        limiter.check_and_consume_at("k", limit, t0).unwrap();
        let before = limiter.entry("k").unwrap();

        limiter
            .check_and_consume_at("k", limit, t0 + Duration::seconds(10))
            .unwrap();
        assert_eq!(limiter.entry("k").unwrap(), before);
    }

    #[test]
    fn empty_key_fails_fast() {
        let (limiter, _) = limiter();
        let limit = RateLimit::new(1, 60).unwrap();

        assert_eq!(
            limiter.check_and_consume("", limit),
            Err(RateLimitError::InvalidKey)
        );
        assert!(limiter.is_empty());
    }

    #[test]
    fn remaining_and_reset() {
        let (limiter, clock) = limiter();
        let limit = RateLimit::new(4, 10).unwrap();

        assert_eq!(limiter.remaining("k", limit), 4);
        limiter.check_and_consume("k", limit).unwrap();
        limiter.check_and_consume("k", limit).unwrap();
        assert_eq!(limiter.remaining("k", limit), 2);

        clock.advance(Duration::seconds(10));
        assert_eq!(limiter.remaining("k", limit), 4);

        assert!(limiter.reset("k"));
        assert!(!limiter.reset("k"));
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (limiter, _) = limiter();
        let short = RateLimit::new(1, 10).unwrap();
        let long = RateLimit::new(1, 600).unwrap();
        let t0 = start();

        limiter.check_and_consume_at("short", short, t0).unwrap();
        limiter.check_and_consume_at("long", long, t0).unwrap();

        assert_eq!(limiter.purge_expired(t0 + Duration::seconds(11)), 1);
        assert!(limiter.entry("short").is_none());
        assert!(limiter.entry("long").is_some());
    }

    #[test]
    fn stale_entries_are_swept_opportunistically() {
        let clock = MockClock::new(start());
        let limiter =
            RateLimiter::with_clock(clock.clone()).with_sweep_interval(Duration::seconds(30));
        let limit = RateLimit::new(1, 5).unwrap();

        limiter.check_and_consume("a", limit).unwrap();
        limiter.check_and_consume("b", limit).unwrap();
        assert_eq!(limiter.len(), 2);

        clock.advance(Duration::seconds(31));
        limiter.check_and_consume("c", limit).unwrap();

        assert_eq!(limiter.len(), 1);
        assert!(limiter.entry("c").is_some());
    }

    #[test]
    fn concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::with_clock(MockClock::new(start())));
        let limit = RateLimit::new(100, 60).unwrap();
        let admitted = Arc::new(AtomicU32::new(0));

        std::thread::scope(|scope| {
            for _ in 0..16 {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        if limiter
                            .check_and_consume("user:42:search.query", limit)
                            .unwrap()
                            .is_admitted()
                        {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 100);
    }
}
