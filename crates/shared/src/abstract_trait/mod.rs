mod clock;
mod jwt;
mod rate_limit;

pub use self::clock::Clock;
pub use self::jwt::{DynIdentityProvider, IdentityProviderTrait};
pub use self::rate_limit::{DynRateLimiter, RateLimiterTrait};
