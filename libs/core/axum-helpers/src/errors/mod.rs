pub mod handlers;
pub mod messages;
pub mod responses;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field path (camelCase, dotted for nested objects) to human-readable message.
pub type InvalidFields = BTreeMap<String, String>;

/// Uniform error body returned by every endpoint.
///
/// ```json
/// {
///   "dateTime": "2024-05-01T10:00:00Z",
///   "code": 400,
///   "message": "Validation failed for the provided input.",
///   "invalidFields": { "birthDate": "Invalid birth date" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub date_time: DateTime<Utc>,
    /// HTTP status code, repeated in the body
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_fields: Option<InvalidFields>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            date_time: Utc::now(),
            code: status.as_u16(),
            message: message.into(),
            invalid_fields: None,
        }
    }

    pub fn with_invalid_fields(mut self, fields: InvalidFields) -> Self {
        self.invalid_fields = Some(fields);
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation failed: {0:?}")]
    Validation(InvalidFields),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// A collaborator (object store, broker) failed; details are logged only.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(invalid_fields(&errors))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::JsonExtractorRejection(e) => e.status(),
            AppError::Validation(_) | AppError::InvalidUuid(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!("JSON extraction error: {:?}", e);
                ErrorResponse::new(status, e.body_text())
            }
            AppError::Validation(fields) => {
                tracing::info!(?fields, "Validation error");
                ErrorResponse::new(status, messages::VALIDATION_FAILED).with_invalid_fields(fields)
            }
            AppError::InvalidUuid(raw) => {
                tracing::warn!(value = %raw, "UUID error");
                ErrorResponse::new(status, messages::INVALID_UUID)
            }
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg) => {
                tracing::info!(status = status.as_u16(), "{}", msg);
                ErrorResponse::new(status, msg)
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                ErrorResponse::new(status, messages::UPSTREAM_ERROR)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                ErrorResponse::new(status, messages::INTERNAL_ERROR)
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                ErrorResponse::new(status, msg)
            }
        };

        body.into_response_with(status)
    }
}

/// Flattens `validator` output into a single field map.
///
/// Nested structs become dotted paths (`contact.phoneNumber1`), list entries
/// get an index (`items[0].name`). Several failures on one field are joined
/// with `", "`. Rules without a message fall back to their code.
pub fn invalid_fields(errors: &ValidationErrors) -> InvalidFields {
    let mut fields = InvalidFields::new();
    collect(errors, None, &mut fields);
    fields
}

fn collect(errors: &ValidationErrors, prefix: Option<&str>, out: &mut InvalidFields) {
    for (field, kind) in errors.errors() {
        let name = camel_case(field);
        let path = match prefix {
            Some(p) => format!("{}.{}", p, name),
            None => name,
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let joined = list
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                merge(out, path, joined);
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, Some(&path), out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, Some(&format!("{}[{}]", path, index)), out);
                }
            }
        }
    }
}

/// Adds `message` under `field`, appending when the field already has one.
pub fn merge(fields: &mut InvalidFields, field: impl Into<String>, message: impl Into<String>) {
    let message = message.into();
    fields
        .entry(field.into())
        .and_modify(|existing| {
            existing.push_str(", ");
            existing.push_str(&message);
        })
        .or_insert(message);
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
