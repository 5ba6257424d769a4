mod jwt;
mod myconfig;
mod rate_limits;

pub use self::jwt::{Claims, JwtConfig};
pub use self::myconfig::{Config, RateLimitSettings};
pub use self::rate_limits::{CategoryConfig, EndpointRuleConfig, RateLimitConfig, RateLimitPolicy};
