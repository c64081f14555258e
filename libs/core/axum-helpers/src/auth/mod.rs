//! Authentication and authorization module.
//!
//! - Stateless JWT issuing and verification ([`JwtAuth`])
//! - Middleware that guards routes and stores [`JwtClaims`] on the request
//! - [`AuthContext`] extractor giving handlers the authenticated principal
//!
//! ```ignore
//! let auth = JwtAuth::new(&JwtConfig::from_env()?);
//!
//! let protected = Router::new()
//!     .route("/api/protected", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;

pub use config::{ACCESS_TOKEN_TTL, JwtConfig, REFRESH_TOKEN_TTL};
pub use jwt::{JwtAuth, JwtClaims, JwtError, TokenSubject, TokenType};
pub use middleware::{AuthContext, jwt_auth_middleware};
