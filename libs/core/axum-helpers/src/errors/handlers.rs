use axum::{http::StatusCode, response::Response};

use super::{ErrorResponse, messages};

/// Router fallback for unknown paths.
pub async fn not_found() -> Response {
    ErrorResponse::new(StatusCode::NOT_FOUND, messages::NOT_FOUND_RESOURCE)
        .into_response_with(StatusCode::NOT_FOUND)
}

pub async fn method_not_allowed() -> Response {
    ErrorResponse::new(StatusCode::METHOD_NOT_ALLOWED, messages::METHOD_NOT_ALLOWED)
        .into_response_with(StatusCode::METHOD_NOT_ALLOWED)
}
