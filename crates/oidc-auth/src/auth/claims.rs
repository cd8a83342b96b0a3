//! JWT claims and the identity/permission data extracted from them.
//!
//! [`Claims`] wraps the decoded payload and exposes typed accessors. A
//! claim with an unexpected shape reads as absent rather than failing, so
//! untrusted input never reaches business logic as a panic or a half-typed
//! value. Personal claims (subject, email, name) are redacted in Debug
//! output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Claims whose values never appear in Debug output.
const REDACTED_CLAIMS: &[&str] = &["sub", "email", "name", "preferred_username"];

/// Decoded JWT payload.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

/// Custom Debug implementation that redacts personal claims.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if REDACTED_CLAIMS.contains(&name.as_str()) {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Claims {
    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the claim is present, whatever its shape.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// String claim. Absent if the claim is missing or not a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// NumericDate claim (`exp`, `nbf`, `iat`) as Unix seconds.
    ///
    /// Integers and finite floats are accepted; floats are truncated.
    pub fn get_numeric_date(&self, name: &str) -> Option<i64> {
        let Value::Number(number) = self.0.get(name)? else {
            return None;
        };
        if let Some(secs) = number.as_i64() {
            return Some(secs);
        }
        number
            .as_f64()
            .filter(|secs| secs.is_finite())
            .map(|secs| secs.trunc() as i64)
    }

    /// Array-of-strings claim. Non-string members are skipped.
    pub fn get_str_list(&self, name: &str) -> Option<Vec<&str>> {
        let values = self.0.get(name)?.as_array()?;
        Some(values.iter().filter_map(Value::as_str).collect())
    }

    /// Object claim.
    pub fn get_object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    /// Subject (`sub`).
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Extract the caller's identity. Every field is optional.
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.get_str("sub").map(ToString::to_string),
            email: self.get_str("email").map(ToString::to_string),
            name: self.get_str("name").map(ToString::to_string),
            username: self
                .get_str("preferred_username")
                .map(ToString::to_string),
        }
    }

    /// Space-separated `scope` claim.
    pub fn scopes(&self) -> BTreeSet<String> {
        self.get_str("scope")
            .map(|scope| scope.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Client roles at `resource_access.<client_id>.roles`.
    pub fn client_roles(&self, client_id: &str) -> BTreeSet<String> {
        self.get_object("resource_access")
            .and_then(|access| access.get(client_id))
            .and_then(|client| client.get("roles"))
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flat `groups` claim.
    pub fn groups(&self) -> BTreeSet<String> {
        self.get_str_list("groups")
            .map(|groups| groups.into_iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Extract scopes, client roles and groups.
    pub fn permissions(&self, client_id: &str) -> Permissions {
        Permissions {
            scopes: self.scopes(),
            roles: self.client_roles(client_id),
            groups: self.groups(),
        }
    }
}

/// Identity of the token's subject.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject (`sub`) - redacted in Debug output.
    #[serde(rename = "sub")]
    pub subject: Option<String>,

    /// Email address - redacted in Debug output.
    pub email: Option<String>,

    /// Display name.
    pub name: Option<String>,

    /// Username (`preferred_username`).
    pub username: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .finish()
    }
}

/// Scopes, roles and groups granted to a token.
///
/// Each set is independent; order is irrelevant and duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub scopes: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    pub groups: BTreeSet<String>,
}

impl Permissions {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Required roles not granted, in the order they were required.
    pub fn missing_roles<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(|role| role.as_ref())
            .filter(|role| !self.roles.contains(*role))
            .map(ToString::to_string)
            .collect()
    }

    /// Whether every required role is granted. An empty list is satisfied.
    pub fn has_all_roles<S: AsRef<str>>(&self, required: &[S]) -> bool {
        self.missing_roles(required).is_empty()
    }
}
