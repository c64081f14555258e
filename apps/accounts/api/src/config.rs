use axum_helpers::JwtConfig;
use core_config::{AppInfo, FromEnv, app_info, env_optional, server::ServerConfig};
use database::postgres::PostgresConfig;
use domain_users::{NatsConfig, S3MediaConfig};

pub use core_config::Environment;

/// Accounts service configuration, composed from the shared config pieces.
///
/// NATS and S3 are optional: leaving `NATS_URL` / `S3_BUCKET` unset disables
/// new-patient publishing / profile-picture storage.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub nats: Option<NatsConfig>,
    pub media: Option<S3MediaConfig>,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - will fail if not set
        let server = ServerConfig::from_env()?; // Uses defaults: HOST=0.0.0.0, PORT=8080
        let jwt = JwtConfig::from_env()?;

        let nats = env_optional("NATS_URL")
            .map(|_| NatsConfig::from_env())
            .transpose()?;
        let media = env_optional("S3_BUCKET")
            .map(|_| S3MediaConfig::from_env())
            .transpose()?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            jwt,
            nats,
            media,
            environment,
        })
    }
}
