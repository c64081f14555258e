use super::config::JwtConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    /// Random per token, so two tokens issued in the same second still differ
    pub jti: String,
    pub token_type: TokenType,
}

/// Identity a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub roles: &'a [String],
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("expected {expected:?} token, got {actual:?}")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },
}

/// Stateless HS256 token issuing and verification.
#[derive(Clone)]
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!(
            access_ttl_secs = config.access_ttl_secs,
            refresh_ttl_secs = config.refresh_ttl_secs,
            "JWT auth initialized"
        );

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_secs),
            refresh_ttl: Duration::seconds(config.refresh_ttl_secs),
        }
    }

    pub fn create_access_token(&self, subject: &TokenSubject<'_>) -> Result<String, JwtError> {
        self.create_token(subject, TokenType::Access, self.access_ttl)
    }

    pub fn create_refresh_token(&self, subject: &TokenSubject<'_>) -> Result<String, JwtError> {
        self.create_token(subject, TokenType::Refresh, self.refresh_ttl)
    }

    fn create_token(
        &self,
        subject: &TokenSubject<'_>,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now();

        let claims = JwtClaims {
            sub: subject.user_id.to_string(),
            email: subject.email.to_string(),
            name: subject.name.to_string(),
            roles: subject.roles.to_vec(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature and expiry, then decode claims.
    pub fn verify_token(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }

    /// Like [`verify_token`](Self::verify_token) but rejects refresh tokens.
    pub fn verify_access_token(&self, token: &str) -> Result<JwtClaims, JwtError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType {
                expected: TokenType::Access,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }
}
