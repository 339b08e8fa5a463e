//! Domain error taxonomy: transport-agnostic error kinds with a status mapping for the API boundary.

use http::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;

/// Error categories. Numeric value is the HTTP status the boundary answers with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    UnprocessableEntity = 422,
    InternalError = 500,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Boxed source for internal failures (storage, SMTP, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error a handler fails with. The dispatcher passes it through untouched;
/// the API boundary turns it into a status code and an envelope.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{message}")]
    BadRequest {
        message: String,
        rule_name: Option<String>,
    },
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },
    #[error("{message}")]
    NotFound {
        resource_type: String,
        resource_id: String,
        message: String,
    },
    #[error("{message}")]
    Conflict {
        property_name: String,
        property_value: String,
        message: String,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Forbidden {
        message: String,
        reason: Option<String>,
    },
    #[error("{0}")]
    Unprocessable(String),
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl DomainError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        DomainError::BadRequest {
            message: message.into(),
            rule_name: None,
        }
    }

    /// Business rule violation; the rule name ends up in the error details.
    pub fn rule_violation(message: impl Into<String>, rule_name: impl Into<String>) -> Self {
        DomainError::BadRequest {
            message: message.into(),
            rule_name: Some(rule_name.into()),
        }
    }

    pub fn validation<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DomainError::Validation {
            message: "One or more validation errors occurred.".to_string(),
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Single validation error; it is also the message.
    pub fn invalid(error: impl Into<String>) -> Self {
        let error = error.into();
        DomainError::Validation {
            message: error.clone(),
            errors: vec![error],
        }
    }

    pub fn not_found(resource_type: impl Into<String>, resource_id: impl ToString) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.to_string();
        DomainError::NotFound {
            message: format!("{} with ID '{}' was not found.", resource_type, resource_id),
            resource_type,
            resource_id,
        }
    }

    pub fn conflict(property_name: impl Into<String>, property_value: impl ToString) -> Self {
        let property_name = property_name.into();
        let property_value = property_value.to_string();
        DomainError::Conflict {
            message: format!(
                "A resource with {} '{}' already exists.",
                property_name, property_value
            ),
            property_name,
            property_value,
        }
    }

    pub fn unauthorized() -> Self {
        DomainError::Unauthorized("Authentication is required to access this resource.".to_string())
    }

    pub fn forbidden() -> Self {
        DomainError::Forbidden {
            message: "You do not have permission to access this resource.".to_string(),
            reason: None,
        }
    }

    pub fn forbidden_because(message: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::Forbidden {
            message: message.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DomainError::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_from(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DomainError::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::BadRequest { .. } | DomainError::Validation { .. } => ErrorCode::BadRequest,
            DomainError::NotFound { .. } => ErrorCode::NotFound,
            DomainError::Conflict { .. } => ErrorCode::Conflict,
            DomainError::Unauthorized(_) => ErrorCode::Unauthorized,
            DomainError::Forbidden { .. } => ErrorCode::Forbidden,
            DomainError::Unprocessable(_) => ErrorCode::UnprocessableEntity,
            DomainError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code().status()
    }

    /// Structured details for the response metadata. `None` when the error carries none.
    pub fn details(&self) -> Option<Map<String, Value>> {
        let mut details = Map::new();
        match self {
            DomainError::BadRequest {
                rule_name: Some(rule),
                ..
            } => {
                details.insert("ruleName".into(), Value::from(rule.as_str()));
            }
            DomainError::Validation { errors, .. } => {
                details.insert("errors".into(), Value::from(errors.clone()));
            }
            DomainError::NotFound {
                resource_type,
                resource_id,
                ..
            } => {
                details.insert("resourceType".into(), Value::from(resource_type.as_str()));
                details.insert("resourceId".into(), Value::from(resource_id.as_str()));
            }
            DomainError::Conflict {
                property_name,
                property_value,
                ..
            } => {
                details.insert("propertyName".into(), Value::from(property_name.as_str()));
                details.insert("propertyValue".into(), Value::from(property_value.as_str()));
            }
            DomainError::Forbidden {
                reason: Some(reason),
                ..
            } => {
                details.insert("reason".into(), Value::from(reason.as_str()));
            }
            _ => {}
        }
        if details.is_empty() {
            None
        } else {
            Some(details)
        }
    }
}
