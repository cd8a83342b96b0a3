//! RSA cryptographic fixtures for testing
//!
//! 2048-bit key generation takes a noticeable fraction of a second, so the
//! commonly used keypairs are generated once per test binary and shared.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Key ID of [`TestKeypair::primary`].
pub const PRIMARY_KID: &str = "sig-key-1";

/// Key ID of [`TestKeypair::rotated`].
pub const ROTATED_KID: &str = "sig-key-2";

/// RSA signing keypair with its public JWK components.
pub struct TestKeypair {
    kid: String,
    encoding_key: EncodingKey,
    /// Base64url-encoded modulus.
    n: String,
    /// Base64url-encoded public exponent.
    e: String,
}

impl TestKeypair {
    /// Generate a fresh 2048-bit keypair.
    pub fn generate(kid: &str) -> Self {
        let private_key =
            RsaPrivateKey::new(&mut OsRng, 2048).expect("RSA key generation should succeed");
        let public_key = private_key.to_public_key();

        let pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("PKCS#1 PEM encoding should succeed");
        let encoding_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).expect("PEM should load as encoding key");

        Self {
            kid: kid.to_string(),
            encoding_key,
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    /// Shared keypair with kid [`PRIMARY_KID`].
    pub fn primary() -> &'static TestKeypair {
        static PRIMARY: OnceLock<TestKeypair> = OnceLock::new();
        PRIMARY.get_or_init(|| TestKeypair::generate(PRIMARY_KID))
    }

    /// Shared keypair with kid [`ROTATED_KID`], for key rotation tests.
    pub fn rotated() -> &'static TestKeypair {
        static ROTATED: OnceLock<TestKeypair> = OnceLock::new();
        ROTATED.get_or_init(|| TestKeypair::generate(ROTATED_KID))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Sign claims with RS256 under this key's kid.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with(claims, Algorithm::RS256, Some(&self.kid))
    }

    /// Sign claims with an explicit RSA algorithm and kid (`None` omits it).
    pub fn sign_with(&self, claims: &Value, algorithm: Algorithm, kid: Option<&str>) -> String {
        let mut header = Header::new(algorithm);
        header.kid = kid.map(ToString::to_string);

        encode(&header, claims, &self.encoding_key).expect("Token signing should succeed")
    }

    /// Public JWK advertising RS256.
    pub fn jwk(&self) -> Value {
        self.jwk_for("RS256")
    }

    /// Public JWK advertising `alg`.
    pub fn jwk_for(&self, alg: &str) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": alg,
            "n": self.n,
            "e": self.e,
        })
    }

    /// Public JWK without `alg` or `use`, as some providers publish them.
    pub fn bare_jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "n": self.n,
            "e": self.e,
        })
    }
}

/// JWKS document containing `keys`.
pub fn jwks(keys: &[Value]) -> Value {
    json!({ "keys": keys })
}

/// Token with an arbitrary header and an empty-looking signature.
///
/// For `alg: none`, HMAC and other forgeries the validator must reject
/// without touching any key.
pub fn unsigned_token(header: &Value, claims: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"forged-signature")
    )
}

/// Replace the payload of a signed token, keeping header and signature.
pub fn tamper_payload(token: &str, claims: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().expect("token should have a header");
    let _payload = parts.next().expect("token should have a payload");
    let signature = parts.next().expect("token should have a signature");

    format!(
        "{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_token_has_three_parts_and_kid() {
        let keypair = TestKeypair::primary();
        let token = keypair.sign(&json!({"sub": "test"}));

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], PRIMARY_KID);
    }

    #[test]
    fn test_sign_with_omits_kid() {
        let token = TestKeypair::primary().sign_with(&json!({}), Algorithm::RS384, None);
        let header_part = token.split('.').next().unwrap();

        let header: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_part).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS384");
        assert!(header.get("kid").is_none());
    }

    #[test]
    fn test_jwk_shape() {
        let jwk = TestKeypair::primary().jwk();

        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["kid"], PRIMARY_KID);
        assert_eq!(jwk["e"], "AQAB");
        assert!(jwk["n"].as_str().unwrap().len() > 300);
    }

    #[test]
    fn test_shared_keypairs_differ() {
        assert_ne!(
            TestKeypair::primary().jwk()["n"],
            TestKeypair::rotated().jwk()["n"]
        );
    }

    #[test]
    fn test_tamper_payload_keeps_signature() {
        let token = TestKeypair::primary().sign(&json!({"role": "user"}));
        let tampered = tamper_payload(&token, &json!({"role": "admin"}));

        assert_ne!(token, tampered);
        assert_eq!(token.rsplit('.').next(), tampered.rsplit('.').next());
    }
}
