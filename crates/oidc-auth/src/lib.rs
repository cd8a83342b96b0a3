//! OIDC Bearer Authentication Library
//!
//! Validates RS256/RS384/RS512 access tokens issued by an OpenID Connect
//! provider (Keycloak in particular) and authorizes requests by client role:
//!
//! - Signing keys are fetched from the provider's JWKS endpoint and cached
//!   with a TTL; concurrent misses share one fetch
//! - Tokens are checked for signature, expiry, not-before, issued-at,
//!   issuer and authorized party
//! - Requests carry `Authorization: Bearer <token>`; the caller's identity,
//!   scopes, client roles and groups are exposed to handlers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use oidc_auth::auth::{AuthorizationGate, JwksClient, JwtValidator};
//! use oidc_auth::config::Config;
//! use oidc_auth::middleware::{require_auth, AuthState};
//!
//! # fn build() -> Result<Router, oidc_auth::config::ConfigError> {
//! let config = Config::from_env()?;
//! let validator_config = config.validator_config();
//! let jwks = Arc::new(JwksClient::with_ttl_and_timeout(
//!     validator_config.jwks_url.clone(),
//!     config.jwks_cache_ttl(),
//!     config.jwks_fetch_timeout(),
//! ));
//! let validator = Arc::new(JwtValidator::new(jwks, validator_config));
//! let gate = Arc::new(AuthorizationGate::for_validator(validator));
//! let state = Arc::new(AuthState::new(gate).requiring(["viewer"]));
//!
//! let app = Router::new()
//!     .route("/reports", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(state, require_auth));
//! # Ok(app)
//! # }
//! ```
//!
//! # Modules
//!
//! - `auth` - Key cache, token validator and authorization gate
//! - `config` - Configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `middleware` - Axum middleware for protected routes
//! - `observability` - Metrics

pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod observability;
