use crate::errors::RateLimitError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted window: one year.
pub const MAX_WINDOW_SECONDS: u64 = 366 * 24 * 60 * 60;

/// A validated `(limit, window)` pair. Both values are strictly positive and
/// the window is at most [`MAX_WINDOW_SECONDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RateLimit {
    limit: u32,
    window_seconds: u64,
}

impl RateLimit {
    pub fn new(limit: u32, window_seconds: u64) -> Result<Self, RateLimitError> {
        if limit == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "limit must be a positive integer".into(),
            ));
        }
        if window_seconds == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "window must be a positive number of seconds".into(),
            ));
        }
        if window_seconds > MAX_WINDOW_SECONDS {
            return Err(RateLimitError::InvalidConfiguration(format!(
                "window must be at most {MAX_WINDOW_SECONDS} seconds, got {window_seconds}"
            )));
        }

        Ok(Self {
            limit,
            window_seconds,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds as i64)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}s", self.limit, self.window_seconds)
    }
}

/// Raw configuration form of a [`RateLimit`], validated on conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitConfig {
    pub limit: u32,
    pub window_seconds: u64,
}

impl TryFrom<LimitConfig> for RateLimit {
    type Error = RateLimitError;

    fn try_from(raw: LimitConfig) -> Result<Self, Self::Error> {
        RateLimit::new(raw.limit, raw.window_seconds)
    }
}

impl From<RateLimit> for LimitConfig {
    fn from(limit: RateLimit) -> Self {
        Self {
            limit: limit.limit,
            window_seconds: limit.window_seconds,
        }
    }
}

/// Counting state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub window_expires_at: DateTime<Utc>,
    pub count: u32,
}

impl RateLimitEntry {
    pub fn open(now: DateTime<Utc>, limit: RateLimit) -> Self {
        Self {
            window_expires_at: now
                .checked_add_signed(limit.window())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_expires_at
    }

    /// Whole seconds until the window closes, rounded up and never below one.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.window_expires_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted {
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    Rejected {
        limit: u32,
        retry_after: u64,
        reset_at: DateTime<Utc>,
    },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admitted { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitDecision::Admitted { limit, .. } | RateLimitDecision::Rejected { limit, .. } => {
                *limit
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitDecision::Admitted { remaining, .. } => *remaining,
            RateLimitDecision::Rejected { .. } => 0,
        }
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        match self {
            RateLimitDecision::Admitted { reset_at, .. }
            | RateLimitDecision::Rejected { reset_at, .. } => *reset_at,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Admitted { .. } => None,
            RateLimitDecision::Rejected { retry_after, .. } => Some(*retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_non_positive_values() {
        assert!(matches!(
            RateLimit::new(0, 60),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            RateLimit::new(5, 0),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        assert!(RateLimit::new(1, 1).is_ok());
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = RateLimitEntry {
            window_expires_at: now + Duration::milliseconds(1500),
            count: 3,
        };

        assert_eq!(entry.retry_after(now), 2);
        assert_eq!(entry.retry_after(now + Duration::milliseconds(1000)), 1);
        assert_eq!(entry.retry_after(now + Duration::milliseconds(1499)), 1);
    }

    #[test]
    fn expiry_is_inclusive_of_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let limit = RateLimit::new(5, 60).unwrap();
        let entry = RateLimitEntry::open(now, limit);

        assert!(!entry.is_expired(now + Duration::seconds(59)));
        assert!(entry.is_expired(now + Duration::seconds(60)));
    }

    #[test]
    fn window_is_bounded_to_one_year() {
        assert!(RateLimit::new(1, MAX_WINDOW_SECONDS).is_ok());
        assert!(matches!(
            RateLimit::new(1, MAX_WINDOW_SECONDS + 1),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            RateLimit::new(1, u64::MAX),
            Err(RateLimitError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn window_end_saturates_near_the_end_of_time() {
        let limit = RateLimit::new(1, MAX_WINDOW_SECONDS).unwrap();
        let entry = RateLimitEntry::open(DateTime::<Utc>::MAX_UTC, limit);

        assert_eq!(entry.window_expires_at, DateTime::<Utc>::MAX_UTC);
    }
}
