//! Users Domain
//!
//! Account registration, sign-in and profile management for the accounts API.
//!
//! # Features
//!
//! - Sign-up with role-dependent required fields and a password policy
//! - Password hashing with Argon2
//! - Sign-in issuing JWT access/refresh tokens, refresh token persisted
//! - Profile read, partial update and soft delete
//! - Profile pictures in S3-compatible storage with pre-signed URLs
//! - New-user notifications over NATS
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, JWT guard
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌───────────────────────────┐
//! │   Service   │ ──▶ │ MediaStore / Publisher    │
//! └──────┬──────┘     └───────────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + implementations)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, roles
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum_helpers::{JwtAuth, JwtConfig};
//! use domain_users::{handlers, InMemoryUserRepository, UserService};
//!
//! let jwt = JwtAuth::new(&JwtConfig::new("a-secret-of-at-least-thirty-two-chars").unwrap());
//! let service = UserService::new(InMemoryUserRepository::new(), jwt);
//!
//! let router = handlers::router(service);
//! ```

pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod postgres;
pub mod publisher;
pub mod repository;
pub mod service;
pub mod validation;

// Re-export commonly used types
pub use error::{UserError, UserResult};
pub use media::{MediaError, MediaStore, S3MediaConfig, S3MediaStore};
pub use models::{
    Contact, NewPatientEvent, NewUserRequest, ProfilePictureUrl, Role, SignInRequest,
    SignInResponse, UpdateUser, User, UserResponse,
};
pub use postgres::PostgresUserRepository;
pub use publisher::{NatsConfig, NatsPatientPublisher, PatientPublisher, PublishError};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
