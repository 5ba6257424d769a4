mod clock;
mod gracefullshutdown;
mod logs;
mod metrics;

pub use self::clock::{MockClock, SystemClock};
pub use self::gracefullshutdown::shutdown_signal;
pub use self::logs::init_logger;
pub use self::metrics::{Metrics, Outcome, RateLimitLabels};
