use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminStats {
    pub users: u64,
    pub products: u64,
    pub orders: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminStatsResponse {
    pub status: String,
    pub stats: AdminStats,
}
