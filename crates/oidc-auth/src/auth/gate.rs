//! Authorization gate: bearer extraction, validation and role checks.
//!
//! The gate turns request headers into an [`AuthContext`] or an
//! [`AuthError`]. It performs no logging of its own; the middleware records
//! the decision once per request.

use crate::auth::claims::{Identity, Permissions};
use crate::auth::jwt::{JwtValidator, TokenValidator};
use crate::errors::AuthError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde::Serialize;
use std::sync::Arc;

/// The authenticated caller, attached to the request after authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub identity: Identity,
    pub permissions: Permissions,
}

impl AuthContext {
    pub fn subject(&self) -> Option<&str> {
        self.identity.subject.as_deref()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.permissions.has_role(role)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.permissions.has_scope(scope)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.permissions.in_group(group)
    }
}

/// Authenticates bearer tokens and enforces required client roles.
#[derive(Clone)]
pub struct AuthorizationGate {
    validator: Arc<dyn TokenValidator>,

    /// Client whose `resource_access` roles are read.
    client_id: String,
}

impl AuthorizationGate {
    pub fn new(validator: Arc<dyn TokenValidator>, client_id: impl Into<String>) -> Self {
        Self {
            validator,
            client_id: client_id.into(),
        }
    }

    /// Gate reading roles for the validator's authorized party.
    pub fn for_validator(validator: Arc<JwtValidator>) -> Self {
        let client_id = validator.config().authorized_party.clone();
        Self::new(validator, client_id)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorize a request.
    ///
    /// Every role in `required_roles` must be granted (AND semantics); an
    /// empty list only requires a valid token.
    ///
    /// # Errors
    ///
    /// - `MissingHeader` - No `Authorization` header, or an empty one
    /// - `MalformedHeader` - Not exactly `Bearer <token>`
    /// - `Unauthorized` - Token validation failed
    /// - `Forbidden` - Valid token lacking one or more required roles
    pub async fn authorize<S: AsRef<str>>(
        &self,
        headers: &HeaderMap,
        required_roles: &[S],
    ) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers)?;

        let claims = self.validator.validate(token).await?;

        let context = AuthContext {
            identity: claims.identity(),
            permissions: claims.permissions(&self.client_id),
        };

        let missing_roles = context.permissions.missing_roles(required_roles);
        if !missing_roles.is_empty() {
            return Err(AuthError::Forbidden { missing_roles });
        }

        Ok(context)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched exactly and the value must split into exactly two
/// space-separated parts.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        None => return Err(AuthError::MissingHeader),
        Some(value) if value.is_empty() => return Err(AuthError::MissingHeader),
        Some(value) => value.to_str().map_err(|_| AuthError::MalformedHeader)?,
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}
