//! # OIDC Test Utilities
//!
//! Shared test utilities for the `oidc-auth` crate.
//!
//! This crate provides:
//! - RSA signing keypairs and JWK documents (`TestKeypair`)
//! - Claim builders for Keycloak-shaped access tokens (`TestTokenBuilder`)
//! - A mock identity provider serving a JWKS (`MockJwksServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oidc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::primary();
//!     let server = MockJwksServer::start(jwks(&[keypair.jwk()])).await;
//!
//!     let claims = TestTokenBuilder::new(&server.issuer(), "my-app")
//!         .with_client_roles("my-app", &["viewer"])
//!         .build();
//!     let token = keypair.sign(&claims);
//!     // validate `token` against `server.jwks_url()`
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
