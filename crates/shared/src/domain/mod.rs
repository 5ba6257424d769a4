mod rate_limit;
mod subject;

pub use self::rate_limit::{
    LimitConfig, MAX_WINDOW_SECONDS, RateLimit, RateLimitDecision, RateLimitEntry,
};
pub use self::subject::Subject;
