//! Shared application state.

use axum_helpers::JwtAuth;
use domain_users::{MediaStore, PatientPublisher};
use std::sync::Arc;

/// Cloned into every router (Arc / pool clones only).
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL database connection pool
    pub db: database::postgres::DatabaseConnection,
    pub jwt: JwtAuth,
    /// `None` when `NATS_URL` is unset or unreachable at startup
    pub publisher: Option<Arc<dyn PatientPublisher>>,
    /// `None` when `S3_BUCKET` is unset
    pub media: Option<Arc<dyn MediaStore>>,
}
