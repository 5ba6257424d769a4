use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub status: String,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total: usize,
}

impl SearchResponse {
    pub fn new(query: String, results: Vec<SearchResult>) -> Self {
        Self {
            status: "success".to_string(),
            total: results.len(),
            query,
            results,
        }
    }
}
