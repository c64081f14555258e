use axum_helpers::{
    JwtAuth,
    server::{create_production_app, health_router},
};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_users::{MediaStore, NatsPatientPublisher, PatientPublisher, S3MediaStore};
use migration::Migrator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    database::postgres::run_migrations::<Migrator>(&db, config.app.name)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;

    let jwt = JwtAuth::new(&config.jwt);

    // New-patient notifications are best effort; the service runs without them
    let publisher: Option<Arc<dyn PatientPublisher>> = match &config.nats {
        Some(nats) => match NatsPatientPublisher::connect(nats).await {
            Ok(publisher) => Some(Arc::new(publisher)),
            Err(e) => {
                tracing::warn!("Failed to connect to NATS: {}", e);
                None
            }
        },
        None => {
            info!("NATS_URL not set, new-patient publishing disabled");
            None
        }
    };

    let media: Option<Arc<dyn MediaStore>> = match &config.media {
        Some(media) => Some(Arc::new(
            S3MediaStore::new(media).map_err(|e| eyre::eyre!("S3 setup failed: {}", e))?,
        )),
        None => {
            info!("S3_BUCKET not set, profile pictures disabled");
            None
        }
    };

    let state = AppState {
        config,
        db,
        jwt,
        publisher,
        media,
    };

    let api_routes = api::routes(&state);

    // create_router adds docs/middleware to our composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // - /health: liveness check with app name/version
    // - /ready: readiness check against PostgreSQL
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    info!("Starting accounts API with graceful shutdown (30s timeout)");

    let server_config = state.config.server.clone();
    let db = state.db.clone();

    create_production_app(
        app,
        &server_config,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing database connections");
            match db.close().await {
                Ok(_) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Accounts API shutdown complete");
    Ok(())
}
