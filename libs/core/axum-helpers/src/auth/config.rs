//! JWT settings loaded through `core_config::FromEnv`.

use core_config::{ConfigError, FromEnv, env_parse, env_required};

pub const MIN_SECRET_LEN: usize = 32;

/// Token TTL defaults (15 minutes / 7 days)
pub const ACCESS_TOKEN_TTL: i64 = 900;
pub const REFRESH_TOKEN_TTL: i64 = 604_800;

/// JWT authentication configuration.
///
/// - `JWT_SECRET` (required, at least 32 characters)
/// - `JWT_ACCESS_TTL_SECS` (default: 900)
/// - `JWT_REFRESH_TTL_SECS` (default: 604800)
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        check_secret(&secret)?;
        Ok(Self {
            secret,
            access_ttl_secs: ACCESS_TOKEN_TTL,
            refresh_ttl_secs: REFRESH_TOKEN_TTL,
        })
    }
}

fn check_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::ParseError {
            key: "JWT_SECRET".to_string(),
            details: format!(
                "must be at least {} characters (got {}). Generate one with: openssl rand -base64 32",
                MIN_SECRET_LEN,
                secret.len()
            ),
        });
    }
    Ok(())
}

impl FromEnv for JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = env_required("JWT_SECRET")?;
        check_secret(&secret)?;

        Ok(Self {
            secret,
            access_ttl_secs: env_parse("JWT_ACCESS_TTL_SECS", &ACCESS_TOKEN_TTL.to_string())?,
            refresh_ttl_secs: env_parse("JWT_REFRESH_TTL_SECS", &REFRESH_TOKEN_TTL.to_string())?,
        })
    }
}
