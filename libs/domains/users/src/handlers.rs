use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    AppError, AuthContext, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
    jwt_auth_middleware,
};
use std::sync::Arc;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::error::UserError;
use crate::models::{
    ContactRequest, ContactResponse, EmailQuery, NewUserRequest, PictureUpload,
    ProfilePictureUrl, SignInRequest, SignInResponse, UpdateContact, UpdateUser, UserResponse,
};
use crate::repository::UserRepository;
use crate::service::UserService;

pub const USERS_TAG: &str = "users";

/// Multipart form field carrying the picture.
pub const PICTURE_FIELD: &str = "file";

const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(
        check_email,
        sign_up,
        sign_in,
        get_user,
        update_user,
        delete_user,
        upload_profile_picture,
        get_profile_picture_url,
    ),
    components(
        schemas(
            NewUserRequest,
            ContactRequest,
            SignInRequest,
            SignInResponse,
            UpdateUser,
            UpdateContact,
            UserResponse,
            ContactResponse,
            ProfilePictureUrl
        ),
        responses(
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            NotFoundResponse,
            InternalServerErrorResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = USERS_TAG, description = "Account registration, sign-in and profiles")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the users router. Everything except email lookup, sign-up and
/// sign-in requires a bearer access token.
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let jwt = service.jwt().clone();
    let shared_service = Arc::new(service);

    let protected = Router::new()
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route(
            "/{id}/profile-picture",
            get(get_profile_picture_url)
                .post(upload_profile_picture)
                .layer(DefaultBodyLimit::max(MAX_PICTURE_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(jwt, jwt_auth_middleware));

    Router::new()
        .route("/email", get(check_email))
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .merge(protected)
        .with_state(shared_service)
}

/// Check whether an email is still free to register
#[utoipa::path(
    get,
    path = "/email",
    tag = USERS_TAG,
    params(EmailQuery),
    responses(
        (status = 200, description = "true when the email is available", body = bool),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn check_email<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    query: Result<Query<EmailQuery>, QueryRejection>,
) -> Result<Json<bool>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let available = service.is_email_available(&query.email).await?;
    Ok(Json(available))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/sign-up",
    tag = USERS_TAG,
    request_body = NewUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn sign_up<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    payload: Result<Json<NewUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let user = service.register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/sign-in",
    tag = USERS_TAG,
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn sign_in<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    let response = service.authenticate(input).await?;
    Ok(Json(response))
}

/// Get a user profile by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = USERS_TAG,
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    actor: AuthContext,
    UuidPath(id): UuidPath,
) -> Result<Json<UserResponse>, AppError> {
    let user = service.get_by_id(id, &actor).await?;
    Ok(Json(user))
}

/// Partially update a user profile
#[utoipa::path(
    put,
    path = "/{id}",
    tag = USERS_TAG,
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    actor: AuthContext,
    UuidPath(id): UuidPath,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(patch) = payload?;
    let user = service.update_by_id(id, patch, &actor).await?;
    Ok(Json(user))
}

/// Soft-delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = USERS_TAG,
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    actor: AuthContext,
    UuidPath(id): UuidPath,
) -> Result<StatusCode, AppError> {
    service.delete_by_id(id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a JPEG or PNG profile picture (multipart field `file`)
#[utoipa::path(
    post,
    path = "/{id}/profile-picture",
    tag = USERS_TAG,
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body(content_type = "multipart/form-data", description = "Form with a single `file` part"),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Picture stored"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn upload_profile_picture<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    actor: AuthContext,
    UuidPath(id): UuidPath,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let upload = read_picture(multipart).await?;
    service.upload_profile_picture(id, upload, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// First `file` part of the form; other parts are skipped.
async fn read_picture(mut multipart: Multipart) -> Result<PictureUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        return Ok(PictureUpload {
            content_type,
            bytes,
        });
    }

    Err(UserError::invalid_field(PICTURE_FIELD, "File must be provided").into())
}

/// Get a time-limited URL for the profile picture
#[utoipa::path(
    get,
    path = "/{id}/profile-picture",
    tag = USERS_TAG,
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pre-signed URL, empty when there is no picture", body = ProfilePictureUrl),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_profile_picture_url<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    actor: AuthContext,
    UuidPath(id): UuidPath,
) -> Result<Json<ProfilePictureUrl>, AppError> {
    let url = service.profile_picture_url(id, &actor).await?;
    Ok(Json(url))
}
