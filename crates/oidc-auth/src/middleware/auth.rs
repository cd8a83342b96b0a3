//! Authentication middleware for protected routes.
//!
//! Runs the authorization gate on every request, injects the resulting
//! [`AuthContext`] into request extensions, and marks every response with
//! `Vary: Authorization` so shared caches never serve one caller's response
//! to another.

use crate::auth::{AuthContext, AuthorizationGate};
use crate::errors::{AuthError, TokenError};
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Gate performing validation and role checks.
    pub gate: Arc<AuthorizationGate>,

    /// Client roles every request must carry. Empty means any valid token.
    pub required_roles: Arc<[String]>,
}

impl AuthState {
    pub fn new(gate: Arc<AuthorizationGate>) -> Self {
        Self {
            gate,
            required_roles: Arc::from(Vec::new()),
        }
    }

    /// Require all of `roles` on routes using this state.
    pub fn requiring<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn required_roles(&self) -> &[String] {
        &self.required_roles
    }
}

/// Authentication middleware that validates bearer tokens and roles.
///
/// Use with `axum::middleware::from_fn_with_state`.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 401 Unauthorized with WWW-Authenticate header if the token is missing or invalid
/// - 403 Forbidden if a required role is missing
/// - 503 Service Unavailable if signing keys cannot be fetched
/// - Otherwise continues to the next handler with `AuthContext` in extensions
#[instrument(skip_all, name = "auth.middleware.require_auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let result = state
        .gate
        .authorize(req.headers(), state.required_roles())
        .await;

    let mut response = match result {
        Ok(context) => {
            tracing::debug!(
                target: "auth.middleware",
                required_roles = ?state.required_roles(),
                roles = ?context.permissions.roles,
                scopes = ?context.permissions.scopes,
                groups = ?context.permissions.groups,
                "Authorization check passed"
            );
            metrics::record_authorization("allowed");

            // Store context in request extensions for downstream handlers
            req.extensions_mut().insert(context);

            next.run(req).await
        }
        Err(err) => {
            match &err {
                AuthError::Forbidden { missing_roles } => tracing::debug!(
                    target: "auth.middleware",
                    required_roles = ?state.required_roles(),
                    missing_roles = ?missing_roles,
                    "Authorization check failed: missing roles"
                ),
                other => tracing::debug!(
                    target: "auth.middleware",
                    error_category = other.category(),
                    "Authentication failed"
                ),
            }
            metrics::record_authorization(decision_outcome(&err));

            err.into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));

    response
}

/// Bounded outcome label for a failed authorization.
fn decision_outcome(err: &AuthError) -> &'static str {
    match err {
        AuthError::Unauthorized(TokenError::FetchFailed(_)) => "unavailable",
        AuthError::Forbidden { .. } => "forbidden",
        AuthError::MissingHeader | AuthError::MalformedHeader | AuthError::Unauthorized(_) => {
            "unauthenticated"
        }
    }
}

/// Extension trait for extracting the auth context from a request.
pub trait AuthContextExt {
    /// Get the authenticated caller from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn auth_context(&self) -> Option<&AuthContext>;
}

impl<B> AuthContextExt for axum::http::Request<B> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }
}
