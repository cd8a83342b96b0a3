//! Bearer token authentication against an OpenID Connect provider.
//!
//! - `jwks` - Key cache for the provider's signing keys
//! - `jwt` - Token validation (signature and standard claims)
//! - `claims` - Claim accessors, identity and permissions
//! - `gate` - Header parsing and required-role enforcement

pub mod claims;
pub mod gate;
pub mod jwks;
pub mod jwt;

pub use claims::{Claims, Identity, Permissions};
pub use gate::{bearer_token, AuthContext, AuthorizationGate};
pub use jwks::{Jwk, JwksClient, JwksResponse};
pub use jwt::{JwtValidator, TokenValidator, MAX_JWT_SIZE_BYTES};
