//! Error types for token validation and authorization.
//!
//! Errors are layered like the components: the key cache, the token
//! validator and the authorization gate each have their own enum, and each
//! layer wraps the one below it. Only [`AuthError`] is turned into an HTTP
//! response.
//!
//! The `Display` output carries the exact reason (which claim failed, which
//! key ID was unknown) and is meant for server-side logs. Client-facing
//! messages built by the `IntoResponse` impl are intentionally generic so a
//! caller probing with forged tokens learns nothing about which check failed.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
const AUTH_REALM: &str = "oidc-auth";

/// Errors returned by the JWKS key cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyCacheError {
    /// The key ID is not present in the (possibly just refreshed) key set.
    #[error("key not found in JWKS: {0}")]
    KeyNotFound(String),

    /// The key set could not be fetched or parsed and no cached copy exists.
    #[error("failed to fetch JWKS: {0}")]
    FetchFailed(String),
}

/// Standard-claim validation failures.
///
/// Each variant names the claim that failed so operators can tell an
/// expired token apart from one minted for another client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("token missing {0} claim")]
    Missing(&'static str),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("token issued in the future")]
    IssuedInFuture,

    #[error("invalid issuer: expected {expected}, got {actual}")]
    WrongIssuer { expected: String, actual: String },

    #[error("authorized party {expected} not found in token")]
    WrongAuthorizedParty { expected: String },
}

impl ClaimError {
    /// Bounded label for metrics and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            ClaimError::Missing(_) => "missing_claim",
            ClaimError::Expired => "expired",
            ClaimError::NotYetValid => "not_yet_valid",
            ClaimError::IssuedInFuture => "issued_in_future",
            ClaimError::WrongIssuer { .. } => "wrong_issuer",
            ClaimError::WrongAuthorizedParty { .. } => "wrong_authorized_party",
        }
    }
}

/// Token validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token exceeds maximum allowed size")]
    TokenTooLarge,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token header missing key ID")]
    MissingKid,

    #[error("unknown signing key: {0}")]
    UnknownKey(String),

    #[error("failed to fetch signing keys: {0}")]
    FetchFailed(String),

    #[error("signing key is not a usable RSA public key: {0}")]
    UnsupportedKeyType(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("invalid token claims: {0}")]
    InvalidClaims(#[from] ClaimError),
}

impl TokenError {
    /// Bounded label for metrics and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            TokenError::TokenTooLarge | TokenError::Malformed(_) | TokenError::MissingKid => {
                "malformed"
            }
            TokenError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            TokenError::UnknownKey(_) => "unknown_key",
            TokenError::FetchFailed(_) => "fetch_failed",
            TokenError::UnsupportedKeyType(_) => "unsupported_key_type",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::InvalidClaims(claim) => claim.category(),
        }
    }
}

impl From<KeyCacheError> for TokenError {
    fn from(err: KeyCacheError) -> Self {
        match err {
            KeyCacheError::KeyNotFound(kid) => TokenError::UnknownKey(kid),
            KeyCacheError::FetchFailed(reason) => TokenError::FetchFailed(reason),
        }
    }
}

/// Authorization gate error, the only error type that reaches HTTP clients.
///
/// Maps to HTTP status codes:
/// - MissingHeader, MalformedHeader, Unauthorized: 401 Unauthorized
/// - Unauthorized caused by a JWKS fetch failure: 503 Service Unavailable
/// - Forbidden: 403 Forbidden
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("Missing required roles: {}", missing_roles.join(", "))]
    Forbidden { missing_roles: Vec<String> },
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MissingHeader | AuthError::MalformedHeader => 401,
            AuthError::Unauthorized(TokenError::FetchFailed(_)) => 503,
            AuthError::Unauthorized(_) => 401,
            AuthError::Forbidden { .. } => 403,
        }
    }

    /// Bounded label for metrics and structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::Unauthorized(err) => err.category(),
            AuthError::Forbidden { .. } => "forbidden",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message, challenge) = match &self {
            AuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTHORIZATION",
                "Authorization header required",
                Some(format!("Bearer realm=\"{}\"", AUTH_REALM)),
            ),
            AuthError::MalformedHeader => (
                StatusCode::UNAUTHORIZED,
                "INVALID_AUTHORIZATION_HEADER",
                "Invalid authorization header format",
                Some(format!(
                    "Bearer realm=\"{}\", error=\"invalid_request\"",
                    AUTH_REALM
                )),
            ),
            AuthError::Unauthorized(TokenError::FetchFailed(reason)) => {
                // Log actual reason server-side
                tracing::warn!(target: "auth.errors", reason = %reason, "Signing keys unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Authentication service temporarily unavailable",
                    None,
                )
            }
            AuthError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "The access token is invalid or expired",
                Some(format!(
                    "Bearer realm=\"{}\", error=\"invalid_token\"",
                    AUTH_REALM
                )),
            ),
            AuthError::Forbidden { .. } => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Insufficient permissions",
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if let Some(challenge) = challenge {
            if let Ok(header_value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}
