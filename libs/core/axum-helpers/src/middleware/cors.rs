use axum::http::{HeaderValue, Method, header};
use core_config::ConfigError;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

const ORIGINS_KEY: &str = "CORS_ALLOWED_ORIGIN";

/// Parses a comma-separated origin list such as
/// `http://localhost:3000,https://app.example.com`.
///
/// Blank entries are skipped; an empty result is an error.
pub fn parse_allowed_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    let origins = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<HeaderValue>().map_err(|e| ConfigError::ParseError {
                key: ORIGINS_KEY.to_string(),
                details: format!("{s}: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if origins.is_empty() {
        return Err(ConfigError::ParseError {
            key: ORIGINS_KEY.to_string(),
            details: "at least one origin is required".to_string(),
        });
    }

    Ok(origins)
}

/// CORS layer for the given origins.
///
/// Methods GET/POST/PUT/DELETE/PATCH/OPTIONS, credentials allowed, 1 hour max age.
pub fn create_cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
