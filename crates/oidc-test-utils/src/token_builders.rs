//! Builder patterns for test claims
//!
//! Produces Keycloak-shaped access token payloads as JSON.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// Defaults to a token valid for one hour, issued now, for subject
/// `test-subject`.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://idp.example/realms/demo", "my-app")
///     .for_user("alice")
///     .with_scope("openid profile")
///     .with_client_roles("my-app", &["viewer", "editor"])
///     .expires_in(300)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new builder for `issuer`, authorized party `azp`.
    pub fn new(issuer: &str, azp: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("azp".to_string(), json!(azp));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("typ".to_string(), json!("Bearer"));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));

        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set email, display name and preferred username
    pub fn with_profile(self, email: &str, name: &str, username: &str) -> Self {
        self.with_claim("email", json!(email))
            .with_claim("name", json!(name))
            .with_claim("preferred_username", json!(username))
    }

    /// Set the scope (space-separated)
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", json!(scope))
    }

    /// Grant client roles under `resource_access.<client_id>.roles`
    pub fn with_client_roles(mut self, client_id: &str, roles: &[&str]) -> Self {
        let access = self
            .claims
            .entry("resource_access")
            .or_insert_with(|| json!({}));
        if let Some(access) = access.as_object_mut() {
            access.insert(client_id.to_string(), json!({ "roles": roles }));
        }
        self
    }

    /// Set the flat `groups` claim
    pub fn with_groups(self, groups: &[&str]) -> Self {
        self.with_claim("groups", json!(groups))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at in seconds from now (positive for a future token)
    pub fn issued_in(self, seconds: i64) -> Self {
        self.with_claim("iat", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set any claim, replacing an existing value
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
