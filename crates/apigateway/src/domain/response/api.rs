use crate::domain::requests::CreateProductRequest;
use serde::{Deserialize, Serialize};
use shared::domain::Subject;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUserResponse {
    pub id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl From<Subject> for CurrentUserResponse {
    fn from(value: Subject) -> Self {
        CurrentUserResponse {
            id: value.id,
            email: value.email,
            roles: value.roles,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductCreatedResponse {
    pub status: String,
    pub message: String,
    pub data: CreateProductRequest,
}

impl From<CreateProductRequest> for ProductCreatedResponse {
    fn from(data: CreateProductRequest) -> Self {
        Self {
            status: "success".to_string(),
            message: "Product created successfully".to_string(),
            data,
        }
    }
}
