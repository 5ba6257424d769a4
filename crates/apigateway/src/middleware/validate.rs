use axum::{
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::errors::HttpError;
use validator::{Validate, ValidationError, ValidationErrors};

/// JSON body extractor that runs `validator` checks and reports failures in
/// the gateway's error envelope.
pub struct SimpleValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for SimpleValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(json_value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        json_value
            .validate()
            .map_err(|validation_errors| HttpError::Validation {
                message: "Invalid request data".to_string(),
                details: format_validation_errors_detailed(&validation_errors),
            })?;

        Ok(Self(json_value))
    }
}

fn json_rejection(rejection: JsonRejection) -> HttpError {
    if rejection.status() == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        HttpError::InvalidContentType("Request must be JSON".to_string())
    } else {
        HttpError::BadRequest(rejection.body_text())
    }
}

fn error_message(field: &str, error: &ValidationError) -> String {
    error
        .message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| match error.code.as_ref() {
            "length" => "Invalid length".to_string(),
            "range" => "Value out of range".to_string(),
            "required" => "This field is required".to_string(),
            _ => format!("Invalid {field}"),
        })
}

fn format_validation_errors_detailed(errors: &ValidationErrors) -> Value {
    let mut error_map = serde_json::Map::new();

    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<String> = field_errors
            .iter()
            .map(|e| error_message(&field, e))
            .collect();
        error_map.insert(field.to_string(), json!(messages));
    }

    Value::Object(error_map)
}
