//! JWT validation against the identity provider's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RSA PKCS#1 v1.5 signatures (RS256, RS384, RS512) are accepted; the
//!   algorithm is checked before any key lookup, so `none`, HMAC and EC
//!   tokens never cause a JWKS fetch
//! - Signature verification happens before any claim is trusted
//! - Standard claims are checked in a fixed order (`exp`, `nbf`, `iat`,
//!   `iss`, `azp`) and each failure names the claim

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::config::ValidatorConfig;
use crate::errors::{ClaimError, TokenError};
use crate::observability::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Maximum allowed JWT size in bytes (8KB).
///
/// Keycloak access tokens with many roles and groups stay well below this.
/// Larger tokens are rejected before base64 decoding or any crypto work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Validates a bearer token and returns its claims.
///
/// Implemented by [`JwtValidator`]; the authorization gate depends on this
/// trait so it can be exercised without a live identity provider.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Claims, TokenError>;
}

/// The parts of a JWT header needed before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    pub algorithm: Algorithm,
    pub kid: String,
}

/// JWT validator using keys from the provider's JWKS endpoint.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Expected issuer, authorized party and leeway.
    config: ValidatorConfig,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Key cache for the issuer's signing keys
    /// * `config` - Expected issuer and authorized party
    pub fn new(jwks_client: Arc<JwksClient>, config: ValidatorConfig) -> Self {
        Self {
            jwks_client,
            config,
        }
    }

    /// Create a validator with its own JWKS client for `config.jwks_url`.
    pub fn from_config(config: ValidatorConfig) -> Self {
        let jwks_client = Arc::new(JwksClient::new(config.jwks_url.clone()));
        Self::new(jwks_client, config)
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and structural parse of the header
    /// 2. Reject any algorithm other than RS256/RS384/RS512
    /// 3. Require a `kid` header
    /// 4. Resolve the public key through the JWKS cache
    /// 5. Verify the RSA signature
    /// 6. Validate `exp`, `nbf`, `iat`, `iss` and `azp`
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` naming the failed step. Callers must not echo
    /// it to clients verbatim.
    #[instrument(skip_all, name = "auth.jwt.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let started = Instant::now();
        let result = self.validate_token(token).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "auth.jwt", "Token validated successfully");
                metrics::record_token_validation("success", None, started.elapsed());
            }
            Err(e) => {
                tracing::debug!(
                    target: "auth.jwt",
                    error = %e,
                    error_category = e.category(),
                    "Token validation failed"
                );
                metrics::record_token_validation("error", Some(e.category()), started.elapsed());
            }
        }

        result
    }

    async fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_token_header(token)?;

        let jwk = self.jwks_client.get_key(&header.kid).await?;

        let decoding_key = rsa_decoding_key(&jwk, header.algorithm)?;

        let claims = verify_signature(token, &decoding_key, header.algorithm)?;

        validate_claims(&claims, &self.config, chrono::Utc::now().timestamp())?;

        Ok(claims)
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        JwtValidator::validate(self, token).await
    }
}

/// Parse the JWT header without verifying the signature.
///
/// Checks the token size and shape, then reads `alg` and `kid`. The
/// algorithm is checked first, so an unsupported algorithm is reported even
/// when the `kid` is missing too.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `Malformed` - Not three segments, bad base64, bad JSON or no `alg`
/// - `UnsupportedAlgorithm` - `alg` is not RS256, RS384 or RS512
/// - `MissingKid` - `kid` missing, not a string or empty
pub fn decode_token_header(token: &str) -> Result<TokenHeader, TokenError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "auth.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    let header_part = match parts.as_slice() {
        [header, payload, signature]
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            *header
        }
        _ => {
            return Err(TokenError::Malformed(format!(
                "expected 3 non-empty segments, got {}",
                parts.len()
            )))
        }
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_part)
        .map_err(|e| TokenError::Malformed(format!("header is not base64url: {}", e)))?;

    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| TokenError::Malformed(format!("header is not JSON: {}", e)))?;

    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| TokenError::Malformed("header missing alg".to_string()))?;

    let algorithm = parse_rsa_algorithm(alg)
        .ok_or_else(|| TokenError::UnsupportedAlgorithm(alg.to_string()))?;

    // Reject empty kid values as well as missing ones
    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .filter(|kid| !kid.is_empty())
        .map(ToString::to_string)
        .ok_or(TokenError::MissingKid)?;

    Ok(TokenHeader { algorithm, kid })
}

fn parse_rsa_algorithm(alg: &str) -> Option<Algorithm> {
    match alg {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        _ => None,
    }
}

fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        _ => "unsupported",
    }
}

/// Build an RSA verification key from a JWK.
///
/// The JWK must be an RSA signing key with `n` and `e`; if it declares an
/// algorithm, it must match the token's.
fn rsa_decoding_key(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, TokenError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(TokenError::UnsupportedKeyType(format!(
            "key type {}",
            jwk.kty
        )));
    }

    if let Some(key_use) = &jwk.key_use {
        if key_use != "sig" {
            tracing::warn!(target: "auth.jwt", key_use = %key_use, "JWK is not a signing key");
            return Err(TokenError::UnsupportedKeyType(format!("key use {}", key_use)));
        }
    }

    if let Some(alg) = &jwk.alg {
        if alg != algorithm_name(algorithm) {
            tracing::warn!(
                target: "auth.jwt",
                jwk_alg = %alg,
                token_alg = algorithm_name(algorithm),
                "JWK algorithm does not match token algorithm"
            );
            return Err(TokenError::UnsupportedKeyType(format!(
                "key is for {}",
                alg
            )));
        }
    }

    let (n, e) = match (&jwk.n, &jwk.e) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            tracing::error!(target: "auth.jwt", kid = ?jwk.kid, "RSA JWK missing n or e");
            return Err(TokenError::UnsupportedKeyType(
                "RSA key missing modulus or exponent".to_string(),
            ));
        }
    };

    DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::error!(target: "auth.jwt", error = %e, "Invalid RSA public key encoding");
        TokenError::UnsupportedKeyType(format!("invalid RSA components: {}", e))
    })
}

/// Verify the signature and decode the payload.
///
/// Only the signature is checked here; claim validation is done by
/// [`validate_claims`] so each failure keeps its own error kind.
fn verify_signature(
    token: &str,
    decoding_key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(token, decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => {
                TokenError::UnsupportedAlgorithm(algorithm_name(algorithm).to_string())
            }
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                TokenError::UnsupportedKeyType(e.to_string())
            }
            _ => TokenError::Malformed(e.to_string()),
        }
    })?;

    Ok(token_data.claims)
}

/// Validate standard claims against an explicit `now` (Unix seconds).
///
/// Checks run in order and stop at the first failure:
/// `exp` (required), `nbf` (optional), `iat` (optional), `iss` (required),
/// `azp` (required, string or list of strings).
pub fn validate_claims(
    claims: &Claims,
    config: &ValidatorConfig,
    now: i64,
) -> Result<(), ClaimError> {
    let leeway = config.leeway_seconds;

    let exp = claims
        .get_numeric_date("exp")
        .ok_or(ClaimError::Missing("exp"))?;
    if now > exp.saturating_add(leeway) {
        tracing::debug!(target: "auth.jwt", exp = exp, now = now, "Token rejected: expired");
        return Err(ClaimError::Expired);
    }

    if let Some(nbf) = claims.get_numeric_date("nbf") {
        if now.saturating_add(leeway) < nbf {
            tracing::debug!(target: "auth.jwt", nbf = nbf, now = now, "Token rejected: not yet valid");
            return Err(ClaimError::NotYetValid);
        }
    }

    if let Some(iat) = claims.get_numeric_date("iat") {
        if now.saturating_add(leeway) < iat {
            tracing::debug!(target: "auth.jwt", iat = iat, now = now, "Token rejected: issued in the future");
            return Err(ClaimError::IssuedInFuture);
        }
    }

    let iss = claims.issuer().ok_or(ClaimError::Missing("iss"))?;
    if iss != config.issuer {
        return Err(ClaimError::WrongIssuer {
            expected: config.issuer.clone(),
            actual: iss.to_string(),
        });
    }

    let expected_azp = config.authorized_party.as_str();
    let azp_matches = match claims.get("azp") {
        None => return Err(ClaimError::Missing("azp")),
        Some(Value::String(azp)) => azp == expected_azp,
        Some(Value::Array(parties)) => parties
            .iter()
            .filter_map(Value::as_str)
            .any(|azp| azp == expected_azp),
        Some(_) => false,
    };
    if !azp_matches {
        return Err(ClaimError::WrongAuthorizedParty {
            expected: config.authorized_party.clone(),
        });
    }

    Ok(())
}
