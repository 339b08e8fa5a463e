//! Uniform JSON envelope `{success, data, message, errors, metadata}` for every endpoint.

use std::collections::BTreeMap;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DomainError;

const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again later.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            metadata: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    pub fn error(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors,
            metadata: None,
        }
    }

    /// Field errors flattened to `"field: message"`; the raw map goes to `metadata.validationErrors`.
    pub fn validation_error(
        message: impl Into<String>,
        validation_errors: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let errors = validation_errors
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{}: {}", field, m)))
            .collect();
        let raw = validation_errors
            .iter()
            .map(|(field, msgs)| (field.clone(), Value::from(msgs.clone())))
            .collect::<Map<_, _>>();
        Self::error(message, Some(errors)).with_metadata("validationErrors", Value::Object(raw))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success without data.
    pub fn ok_empty(message: Option<String>) -> Self {
        Self {
            success: true,
            data: None,
            message,
            errors: None,
            metadata: None,
        }
    }

    /// Boundary translation of a handler error: status code plus envelope.
    /// Internal errors are masked; their message never leaves the process.
    pub fn from_domain_error(err: &DomainError) -> (StatusCode, Self) {
        let status = err.status();
        if let DomainError::Internal { .. } = err {
            return (status, Self::error(UNEXPECTED_ERROR, None));
        }
        let mut response = Self::error(err.to_string(), None);
        if let DomainError::Validation { errors, .. } = err {
            response.errors = Some(errors.clone());
        }
        if let Some(details) = err.details() {
            for (key, value) in details {
                response = response.with_metadata(key, value);
            }
        }
        (status, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(body, json!({ "success": true, "data": 42 }));
    }

    #[test]
    fn validation_error_flattens_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), vec!["is required".to_string()]);
        fields.insert("email".to_string(), vec!["is invalid".to_string(), "is taken".to_string()]);
        let resp = ApiResponse::<()>::validation_error("Validation failed", &fields);
        assert_eq!(
            resp.errors.unwrap(),
            vec!["email: is invalid", "email: is taken", "name: is required"]
        );
        assert_eq!(
            resp.metadata.unwrap()["validationErrors"]["name"],
            json!(["is required"])
        );
    }

    #[test]
    fn domain_error_details_become_metadata() {
        let (status, resp) = ApiResponse::<()>::from_domain_error(&DomainError::conflict("email", "a@b.c"));
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("A resource with email 'a@b.c' already exists."));
        assert_eq!(resp.metadata.unwrap()["propertyName"], "email");
    }

    #[test]
    fn internal_errors_are_masked() {
        let (status, resp) = ApiResponse::<()>::from_domain_error(&DomainError::internal("db password leaked"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.message.as_deref(), Some(UNEXPECTED_ERROR));
    }
}
