use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    #[schema(example = "Hand-thrown stoneware mug")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Glazed in ash blue, holds 350ml")]
    pub description: Option<String>,

    #[validate(range(min = 0.01, message = "Price must be at least 0.01"))]
    #[schema(example = 28.5)]
    pub price: f64,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[schema(example = 12)]
    pub stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: f64, stock: i64) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            description: None,
            price,
            stock,
        }
    }

    #[test]
    fn accepts_boundary_values() {
        assert!(product("a", 0.01, 0).validate().is_ok());
        assert!(product(&"x".repeat(100), 10.0, 3).validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let errors = product("", 0.0, -1).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("stock"));

        assert!(product(&"x".repeat(101), 1.0, 0).validate().is_err());
    }
}
