mod api;
mod search;
mod stats;

pub use self::api::{CurrentUserResponse, MessageResponse, ProductCreatedResponse};
pub use self::search::{SearchResponse, SearchResult};
pub use self::stats::{AdminStats, AdminStatsResponse};
