//! # Axum Helpers
//!
//! Shared building blocks for the HTTP services in this workspace.
//!
//! - **[`auth`]**: stateless JWT issuing/verification, route guard, [`AuthContext`]
//! - **[`server`]**: router assembly with API docs, health, graceful shutdown
//! - **[`middleware`]**: CORS and security headers
//! - **[`errors`]**: uniform error body and [`AppError`]
//! - **[`extractors`]**: UUID path and validated JSON
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::Router;
//! use axum_helpers::server::{create_app, create_router};
//! use core_config::server::ServerConfig;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(paths())]
//! struct ApiDoc;
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let api_routes = Router::new();
//!     let router = create_router::<ApiDoc>(api_routes).await?;
//!
//!     create_app(router, &ServerConfig::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod errors;
pub mod extractors;
pub mod middleware;
pub mod server;

pub use auth::{
    ACCESS_TOKEN_TTL, AuthContext, JwtAuth, JwtClaims, JwtConfig, JwtError, REFRESH_TOKEN_TTL,
    TokenSubject, TokenType, jwt_auth_middleware,
};

pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, build_router, create_app,
    create_production_app, create_router, health_router, run_health_checks, shutdown_signal,
};

pub use middleware::{create_cors_layer, security_headers};

pub use errors::{AppError, ErrorResponse, InvalidFields};

pub use extractors::{UuidPath, ValidatedJson};
