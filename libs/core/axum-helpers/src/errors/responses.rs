//! Reusable OpenAPI response types for consistent API documentation.

use super::ErrorResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Validation Error",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 400,
        "message": "Validation failed for the provided input.",
        "invalidFields": {
            "birthDate": "Invalid birth date",
            "contact.phoneNumber1": "Phone number must be provided"
        }
    })
)]
pub struct BadRequestValidationResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Invalid UUID",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 400,
        "message": "Invalid UUID format."
    })
)]
pub struct BadRequestUuidResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Unauthorized - missing, invalid or expired credentials",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 401,
        "message": "Unauthorized"
    })
)]
pub struct UnauthorizedResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Forbidden - Insufficient permissions",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 403,
        "message": "Access forbidden"
    })
)]
pub struct ForbiddenResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Resource not found",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 404,
        "message": "User with id=0192f5e4-5c2b-7000-8000-000000000001 not found."
    })
)]
pub struct NotFoundResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Internal Server Error",
    content_type = "application/json",
    example = json!({
        "dateTime": "2024-05-01T10:00:00Z",
        "code": 500,
        "message": "An unexpected error occurred."
    })
)]
pub struct InternalServerErrorResponse(pub ErrorResponse);
