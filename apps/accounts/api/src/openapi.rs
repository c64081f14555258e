use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Accounts API",
        version = "0.1.0",
        description = "User registration, sign-in and profile management"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = crate::api::USERS_PATH, api = domain_users::handlers::ApiDoc)
    )
)]
pub struct ApiDoc;
