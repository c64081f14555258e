use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, InvalidFields, JwtError, errors::messages};
use thiserror::Error;
use uuid::Uuid;

use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Validation failed: {0:?}")]
    Validation(InvalidFields),

    #[error("Invalid roles provided.")]
    InvalidRoles,

    #[error("{0} is already in use, please provide another email address.")]
    EmailInUse(String),

    #[error("Invalid role provided: {0}")]
    RoleNotFound(String),

    #[error("User with id={0} not found.")]
    NotFound(Uuid),

    #[error("User with email={0} not found.")]
    EmailNotFound(String),

    #[error("Unauthorized")]
    InvalidCredentials,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Media storage error: {0}")]
    Media(#[from] MediaError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut fields = InvalidFields::new();
        fields.insert(field.to_string(), message.to_string());
        UserError::Validation(fields)
    }
}

/// Convert UserError to AppError for standardized error responses
impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Validation(fields) => AppError::Validation(fields),
            e @ (UserError::InvalidRoles
            | UserError::EmailInUse(_)
            | UserError::RoleNotFound(_)) => AppError::BadRequest(e.to_string()),
            e @ (UserError::NotFound(_) | UserError::EmailNotFound(_)) => {
                AppError::NotFound(e.to_string())
            }
            UserError::InvalidCredentials => {
                AppError::Unauthorized(messages::UNAUTHORIZED.to_string())
            }
            UserError::Forbidden => AppError::Forbidden(messages::FORBIDDEN.to_string()),
            UserError::Media(e) => AppError::Upstream(e.to_string()),
            e @ (UserError::PasswordHash(_)
            | UserError::Token(_)
            | UserError::Database(_)
            | UserError::Internal(_)) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(err: UserError) -> StatusCode {
        AppError::from(err).status()
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        assert_eq!(status(UserError::InvalidRoles), StatusCode::BAD_REQUEST);
        assert_eq!(status(UserError::EmailInUse("a@b.com".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(UserError::RoleNotFound("NURSE".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(UserError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status(UserError::EmailNotFound("a@b.com".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(UserError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(UserError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status(UserError::Database("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            UserError::EmailInUse("a@b.com".into()).to_string(),
            "a@b.com is already in use, please provide another email address."
        );
        assert_eq!(
            UserError::NotFound(Uuid::nil()).to_string(),
            "User with id=00000000-0000-0000-0000-000000000000 not found."
        );
        assert_eq!(
            UserError::RoleNotFound("NURSE".into()).to_string(),
            "Invalid role provided: NURSE"
        );
    }

    #[test]
    fn test_invalid_field_helper() {
        let UserError::Validation(fields) = UserError::invalid_field("file", "Invalid file extension")
        else {
            panic!("expected validation error");
        };
        assert_eq!(fields["file"], "Invalid file extension");
    }
}
