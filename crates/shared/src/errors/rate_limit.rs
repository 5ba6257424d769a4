use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown rate limit category: {0}")]
    UnknownCategory(String),

    #[error("Unknown rate limit subcategory '{subcategory}' for category '{category}'")]
    UnknownSubcategory {
        category: String,
        subcategory: String,
    },

    #[error("Rate limit key must not be empty")]
    InvalidKey,
}
