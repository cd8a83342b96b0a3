//! Identity provider configuration.
//!
//! [`Config`] is loaded from environment variables by the embedding service
//! and turned into the immutable [`ValidatorConfig`] consumed by the token
//! validator. Nothing here is global: every validator is built from its own
//! `ValidatorConfig`, so several issuers can be served side by side.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default identity provider base URL.
pub const DEFAULT_KEYCLOAK_BASE_URL: &str = "http://localhost:8080";

/// Default realm.
pub const DEFAULT_KEYCLOAK_REALM: &str = "myrealm";

/// Default client ID (expected `azp` and roles client).
pub const DEFAULT_CLIENT_ID: &str = "my-golang-app";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the JWKS fetch timeout.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Upper bound for the claim clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 600;

/// Settings the token validator checks every token against.
///
/// Immutable after construction; share it behind the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Expected `iss` claim, compared exactly.
    pub issuer: String,

    /// Expected `azp` claim, also the `resource_access` key roles are read from.
    pub authorized_party: String,

    /// URL of the provider's JWKS document.
    pub jwks_url: String,

    /// Tolerance applied to `exp`, `nbf` and `iat`. Zero means exact checks.
    pub leeway_seconds: i64,
}

impl ValidatorConfig {
    /// Create a validator configuration for any OIDC provider.
    pub fn new(
        issuer: impl Into<String>,
        authorized_party: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            authorized_party: authorized_party.into(),
            jwks_url: jwks_url.into(),
            leeway_seconds: 0,
        }
    }

    /// Create a validator configuration for a Keycloak realm.
    ///
    /// Issuer is `<base_url>/realms/<realm>` and the JWKS document lives at
    /// `<issuer>/protocol/openid-connect/certs`.
    pub fn for_keycloak(base_url: &str, realm: &str, client_id: &str) -> Self {
        let issuer = format!("{}/realms/{}", base_url.trim_end_matches('/'), realm);
        let jwks_url = format!("{}/protocol/openid-connect/certs", issuer);
        Self::new(issuer, client_id, jwks_url)
    }

    /// Set the clock skew tolerance for time-based claims.
    pub fn with_leeway(mut self, leeway_seconds: i64) -> Self {
        self.leeway_seconds = leeway_seconds.max(0);
        self
    }
}

/// Configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity provider base URL (default: "http://localhost:8080").
    pub keycloak_base_url: String,

    /// Realm (tenant) the tokens are issued by.
    pub keycloak_realm: String,

    /// Client ID the tokens must be issued to.
    pub client_id: String,

    /// How long a fetched key set is served before refreshing.
    pub jwks_cache_ttl_seconds: u64,

    /// Bound on a single key set fetch.
    pub jwks_fetch_timeout_seconds: u64,

    /// Clock skew tolerance for `exp`, `nbf` and `iat`.
    pub jwt_clock_skew_seconds: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid identity provider URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Empty value for environment variable: {0}")]
    EmptyValue(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let keycloak_base_url = vars
            .get("KEYCLOAK_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_KEYCLOAK_BASE_URL.to_string());

        if !keycloak_base_url.starts_with("http://") && !keycloak_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "KEYCLOAK_BASE_URL must start with http:// or https://, got '{}'",
                keycloak_base_url
            )));
        }

        let keycloak_realm = vars
            .get("KEYCLOAK_REALM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_KEYCLOAK_REALM.to_string());
        if keycloak_realm.trim().is_empty() {
            return Err(ConfigError::EmptyValue("KEYCLOAK_REALM".to_string()));
        }

        let client_id = vars
            .get("KEYCLOAK_CLIENT_ID")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        if client_id.trim().is_empty() {
            return Err(ConfigError::EmptyValue("KEYCLOAK_CLIENT_ID".to_string()));
        }

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 || value > MAX_JWKS_FETCH_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_JWKS_FETCH_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW_SECONDS {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            value
        } else {
            0
        };

        Ok(Config {
            keycloak_base_url,
            keycloak_realm,
            client_id,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwt_clock_skew_seconds,
        })
    }

    /// Derive the validator configuration for the configured realm.
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig::for_keycloak(
            &self.keycloak_base_url,
            &self.keycloak_realm,
            &self.client_id,
        )
        .with_leeway(self.jwt_clock_skew_seconds)
    }

    /// JWKS cache TTL as a `Duration`.
    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_seconds)
    }

    /// JWKS fetch timeout as a `Duration`.
    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_seconds)
    }
}
