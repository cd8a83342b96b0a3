//! Mock identity provider for JWKS tests
//!
//! Serves a JWKS document at the Keycloak certs path of a test realm, so
//! issuer and JWKS URL relate exactly as they do against a real server.

use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Realm served by [`MockJwksServer`].
pub const TEST_REALM: &str = "test-realm";

/// Mock Keycloak realm serving a JWKS document.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server returning `jwks` on every request.
    pub async fn start(jwks: Value) -> Self {
        Self::start_with(ResponseTemplate::new(200).set_body_json(jwks), None).await
    }

    /// Start a server returning `jwks` and verifying, on drop, that the
    /// certs endpoint was hit exactly `fetches` times.
    pub async fn start_expecting(jwks: Value, fetches: u64) -> Self {
        Self::start_with(ResponseTemplate::new(200).set_body_json(jwks), Some(fetches)).await
    }

    /// Start a server answering the certs endpoint with `status`.
    pub async fn start_failing(status: u16) -> Self {
        Self::start_with(ResponseTemplate::new(status), None).await
    }

    /// Start a server returning `jwks` after `delay`.
    pub async fn start_slow(jwks: Value, delay: Duration) -> Self {
        Self::start_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks)
                .set_delay(delay),
            None,
        )
        .await
    }

    async fn start_with(response: ResponseTemplate, fetches: Option<u64>) -> Self {
        let server = MockServer::start().await;

        let mut mock = Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(response);
        if let Some(fetches) = fetches {
            mock = mock.expect(fetches);
        }
        mock.mount(&server).await;

        Self { server }
    }

    /// Replace the served document, e.g. after a key rotation.
    pub async fn rotate(&self, jwks: Value) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&self.server)
            .await;
    }

    /// Make the certs endpoint fail with `status` from now on.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(Self::certs_path()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Base URL of the provider (without realm).
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer of the test realm.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), TEST_REALM)
    }

    /// JWKS endpoint of the test realm.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), Self::certs_path())
    }

    /// Number of requests the server has received.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    fn certs_path() -> String {
        format!("/realms/{}/protocol/openid-connect/certs", TEST_REALM)
    }
}
