use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Source of the current time for window bookkeeping.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}
