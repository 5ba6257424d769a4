mod product;
mod search;

pub use self::product::CreateProductRequest;
pub use self::search::SearchQuery;
