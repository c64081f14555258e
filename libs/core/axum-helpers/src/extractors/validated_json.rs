//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Deserializes the body and runs `Validate`.
///
/// Malformed JSON and constraint failures both render as [`AppError`] bodies;
/// constraint failures list every offending field under `invalidFields`.
///
/// ```ignore
/// async fn create(ValidatedJson(payload): ValidatedJson<NewUserRequest>) -> impl IntoResponse {
///     /* payload passed #[validate(...)] rules */
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await?;
        data.validate()?;
        Ok(ValidatedJson(data))
    }
}
