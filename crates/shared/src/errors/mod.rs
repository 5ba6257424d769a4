mod auth;
mod error;
mod http;
mod rate_limit;

pub use self::auth::AuthError;
pub use self::error::{ErrorBody, ErrorResponse};
pub use self::http::{HttpError, INTERNAL_ERROR_MESSAGE, InternalErrorDetail};
pub use self::rate_limit::RateLimitError;
