//! Request body extraction

use async_trait::async_trait;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::UserError;

/// JSON body with every string value trimmed before deserialization
///
/// Malformed bodies are rejected as validation errors.
pub struct TrimmedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for TrimmedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = UserError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| UserError::Validation(rejection.body_text()))?;

        trim_strings(&mut body);

        serde_json::from_value(body)
            .map(TrimmedJson)
            .map_err(|e| UserError::Validation(e.to_string()))
    }
}

/// Trim every string in a JSON value, recursively
pub fn trim_strings(value: &mut Value) {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                *text = trimmed.to_string();
            }
        }
        Value::Array(items) => items.iter_mut().for_each(trim_strings),
        Value::Object(fields) => fields.values_mut().for_each(trim_strings),
        _ => {}
    }
}
