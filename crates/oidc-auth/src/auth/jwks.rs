//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! The JWKS (JSON Web Key Set) client fetches the provider's key set (for
//! Keycloak: `<issuer>/protocol/openid-connect/certs`) and caches it with a
//! configurable TTL.
//!
//! # Caching
//!
//! - A lookup against a fresh cache only takes the read lock; concurrent
//!   lookups never block each other
//! - An empty or expired cache is refreshed before the lookup, at most once
//!   per call
//! - A miss against a fresh cache is a miss; it does not trigger a refresh
//! - The new key set replaces the old one wholesale under the write lock,
//!   so readers never observe a half-updated set
//!
//! # Refresh
//!
//! Refreshes are single-flight: callers that find the cache stale queue on
//! one refresh guard, and a caller that waited while another refresh
//! finished reuses that outcome instead of fetching again. The fetch runs on
//! its own task with its own timeout, so a cancelled request does not abort
//! a refresh other requests are waiting for.
//!
//! If a refresh fails while an older key set is cached, the stale set keeps
//! being served and the failure is logged. Only a failure on a cold cache is
//! returned to the caller. `force_refresh` always reports a failed fetch,
//! including one it shared with a concurrent lookup.
//!
//! A failed refresh does not advance the cache's fetch time, so lookups keep
//! retrying the endpoint. Retries are spaced at least `STALE_RETRY_INTERVAL`
//! apart; in between, lookups use the stale set without waiting on the
//! network. A request that does trigger a retry during an outage can still
//! wait up to the fetch timeout.

use crate::errors::KeyCacheError;
use crate::observability::metrics;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default bound on a single JWKS fetch.
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Minimum spacing between fetches while a failing endpoint is bypassed
/// with stale keys.
const STALE_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// JSON Web Key from the JWKS endpoint.
///
/// Only RSA keys are usable for verification. Other key types are kept in
/// the cache and rejected by the validator when a token references them.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for usable signing keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is meant for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing, "enc" for encryption).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Cached key set with its fetch time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Arc<Jwk>>,

    /// When the key set was fetched.
    fetched_at: Instant,
}

impl CachedJwks {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }

    fn lookup(&self, kid: &str) -> Result<Arc<Jwk>, KeyCacheError> {
        match self.keys.get(kid) {
            Some(key) => {
                tracing::debug!(target: "auth.jwks", kid = %kid, "JWKS cache hit");
                Ok(Arc::clone(key))
            }
            None => {
                tracing::warn!(target: "auth.jwks", kid = %kid, "Key not found in JWKS");
                Err(KeyCacheError::KeyNotFound(kid.to_string()))
            }
        }
    }
}

/// The most recent fetch attempt.
struct RefreshAttempt {
    finished_at: Instant,

    /// Fetch result before any stale fallback.
    fetched: Result<(), KeyCacheError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    IfStale,
    Force,
}

struct Inner {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS, carries the fetch timeout.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: RwLock<Option<CachedJwks>>,

    /// Single-flight refresh guard, holds the last attempt.
    refresh_guard: Mutex<Option<RefreshAttempt>>,

    /// Cache TTL duration.
    cache_ttl: Duration,
}

/// JWKS client for fetching and caching public keys.
///
/// Construct one per issuer and share it behind an `Arc`.
pub struct JwksClient {
    inner: Arc<Inner>,
}

impl JwksClient {
    /// Create a new JWKS client with the default TTL (5 minutes) and fetch
    /// timeout (10 seconds).
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the provider's JWKS endpoint
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a new JWKS client with custom cache TTL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the provider's JWKS endpoint
    /// * `cache_ttl` - How long to cache JWKS before refreshing
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        Self::with_ttl_and_timeout(
            jwks_url,
            cache_ttl,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create a new JWKS client with custom cache TTL and fetch timeout.
    pub fn with_ttl_and_timeout(
        jwks_url: String,
        cache_ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            inner: Arc::new(Inner {
                jwks_url,
                http_client,
                cache: RwLock::new(None),
                refresh_guard: Mutex::new(None),
                cache_ttl,
            }),
        }
    }

    /// URL this client fetches keys from.
    pub fn jwks_url(&self) -> &str {
        &self.inner.jwks_url
    }

    /// Get a JWK by key ID.
    ///
    /// Refreshes the key set first if the cache is empty or older than the
    /// TTL, then looks the key up.
    ///
    /// # Errors
    ///
    /// Returns `KeyCacheError::FetchFailed` if the cache is cold and the key
    /// set cannot be fetched.
    /// Returns `KeyCacheError::KeyNotFound` if the key ID is not in the set.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<Jwk>, KeyCacheError> {
        {
            let cache = self.inner.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_stale(self.inner.cache_ttl) {
                    return cached.lookup(kid);
                }
            }
        }

        // Cache empty or expired
        self.run_refresh(RefreshMode::IfStale).await?;

        let cache = self.inner.cache.read().await;
        match cache.as_ref() {
            Some(cached) => cached.lookup(kid),
            None => Err(KeyCacheError::FetchFailed(
                "JWKS cache empty after refresh".to_string(),
            )),
        }
    }

    /// Force refresh the cache regardless of its age.
    ///
    /// Useful for manual cache invalidation after a known key rotation.
    /// Unlike lookups, a failure is returned even when a stale set exists.
    pub async fn force_refresh(&self) -> Result<(), KeyCacheError> {
        self.run_refresh(RefreshMode::Force).await
    }

    /// Drop all cached keys; the next lookup fetches the key set again.
    pub async fn clear_cache(&self) {
        let mut cache = self.inner.cache.write().await;
        *cache = None;
    }

    /// Run a refresh on its own task so it outlives a cancelled caller.
    async fn run_refresh(&self, mode: RefreshMode) -> Result<(), KeyCacheError> {
        let inner = Arc::clone(&self.inner);
        let requested_at = Instant::now();

        tokio::spawn(async move { inner.refresh(requested_at, mode).await })
            .await
            .map_err(|e| {
                tracing::error!(target: "auth.jwks", error = %e, "JWKS refresh task failed");
                KeyCacheError::FetchFailed("JWKS refresh task failed".to_string())
            })?
    }
}

impl Inner {
    /// Refresh the key set, collapsing concurrent refreshes into one fetch.
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn refresh(
        &self,
        requested_at: Instant,
        mode: RefreshMode,
    ) -> Result<(), KeyCacheError> {
        let mut last_attempt = self.refresh_guard.lock().await;

        if let Some(attempt) = last_attempt.as_ref() {
            // A fetch that finished while we waited already answered us
            if attempt.finished_at >= requested_at {
                tracing::debug!(target: "auth.jwks", "Reusing concurrent JWKS refresh outcome");
                return self.resolve(attempt.fetched.clone(), mode).await;
            }

            // Hold off on a failing endpoint while stale keys are served
            if mode == RefreshMode::IfStale
                && attempt.fetched.is_err()
                && attempt.finished_at.elapsed() < STALE_RETRY_INTERVAL
                && self.cache.read().await.is_some()
            {
                return Ok(());
            }
        }

        if mode == RefreshMode::IfStale {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_stale(self.cache_ttl) {
                    return Ok(());
                }
            }
        }

        let started = Instant::now();
        let fetched = match self.fetch().await {
            Ok(keys) => {
                tracing::info!(
                    target: "auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );
                let mut cache = self.cache.write().await;
                *cache = Some(CachedJwks {
                    keys,
                    fetched_at: Instant::now(),
                });
                Ok(())
            }
            Err(err) => Err(err),
        };

        *last_attempt = Some(RefreshAttempt {
            finished_at: Instant::now(),
            fetched: fetched.clone(),
        });

        let outcome = self.resolve(fetched.clone(), mode).await;
        let status = match (&fetched, &outcome) {
            (Ok(()), _) => "success",
            (Err(err), Ok(())) => {
                tracing::warn!(
                    target: "auth.jwks",
                    error = %err,
                    "JWKS refresh failed, serving stale key set"
                );
                "stale"
            }
            (Err(_), Err(_)) => "error",
        };
        metrics::record_jwks_refresh(status, started.elapsed());

        outcome
    }

    /// Map a fetch result to the caller's outcome.
    ///
    /// Lookups fall back to a cached key set when the fetch failed; forced
    /// refreshes always see the failure.
    async fn resolve(
        &self,
        fetched: Result<(), KeyCacheError>,
        mode: RefreshMode,
    ) -> Result<(), KeyCacheError> {
        if fetched.is_err() && mode == RefreshMode::IfStale && self.cache.read().await.is_some() {
            return Ok(());
        }
        fetched
    }

    /// Fetch and parse the key set. Does not touch the cache.
    async fn fetch(&self) -> Result<HashMap<String, Arc<Jwk>>, KeyCacheError> {
        tracing::debug!(target: "auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "auth.jwks", error = %e, "Failed to fetch JWKS");
                KeyCacheError::FetchFailed(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeyCacheError::FetchFailed(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to parse JWKS response");
            KeyCacheError::FetchFailed(format!("invalid JWKS document: {}", e))
        })?;

        Ok(index_keys(jwks))
    }
}

/// Build the key ID map, dropping keys that cannot be addressed.
fn index_keys(jwks: JwksResponse) -> HashMap<String, Arc<Jwk>> {
    let mut keys = HashMap::with_capacity(jwks.keys.len());
    for key in jwks.keys {
        match key.kid.clone().filter(|kid| !kid.is_empty()) {
            Some(kid) => {
                keys.insert(kid, Arc::new(key));
            }
            None => {
                tracing::debug!(target: "auth.jwks", kty = %key.kty, "Skipping JWK without kid");
            }
        }
    }
    keys
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CERTS_PATH: &str = "/realms/demo/protocol/openid-connect/certs";

    fn keycloak_jwks() -> serde_json::Value {
        serde_json::json!({
            "keys": [
                {
                    "kid": "sig-key-1",
                    "kty": "RSA",
                    "alg": "RS256",
                    "use": "sig",
                    "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw",
                    "e": "AQAB"
                },
                {
                    "kid": "enc-key-1",
                    "kty": "RSA",
                    "alg": "RSA-OAEP",
                    "use": "enc",
                    "n": "AQAB",
                    "e": "AQAB"
                },
                {
                    "kty": "EC",
                    "crv": "P-256",
                    "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
                    "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"
                }
            ]
        })
    }

    async fn mount_jwks(server: &MockServer, expected_fetches: u64) {
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .expect(expected_fetches)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer, ttl: Duration) -> JwksClient {
        JwksClient::with_ttl(format!("{}{}", server.uri(), CERTS_PATH), ttl)
    }

    #[test]
    fn test_jwk_deserialization_rsa() {
        let json = r#"{
            "kid": "sig-key-1",
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": "modulus",
            "e": "AQAB",
            "x5c": ["MIIC..."],
            "x5t": "thumb"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("sig-key-1"));
        assert_eq!(jwk.n.as_deref(), Some("modulus"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty": "EC"}"#).unwrap();

        assert_eq!(jwk.kty, "EC");
        assert!(jwk.kid.is_none());
        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
        assert!(jwk.alg.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_index_keys_skips_keys_without_kid() {
        let jwks: JwksResponse = serde_json::from_value(keycloak_jwks()).unwrap();

        let keys = index_keys(jwks);

        assert_eq!(keys.len(), 2);
        assert!(keys.contains_key("sig-key-1"));
        assert!(keys.contains_key("enc-key-1"));
    }

    #[test]
    fn test_jwks_client_creation() {
        let client = JwksClient::new(
            "http://localhost:8080/realms/demo/protocol/openid-connect/certs".to_string(),
        );
        assert_eq!(
            client.jwks_url(),
            "http://localhost:8080/realms/demo/protocol/openid-connect/certs"
        );
        assert_eq!(
            client.inner.cache_ttl,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS)
        );
    }

    #[test]
    fn test_jwks_client_custom_ttl() {
        let client = JwksClient::with_ttl(
            "http://localhost:8080/certs".to_string(),
            Duration::from_secs(60),
        );
        assert_eq!(client.inner.cache_ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_once_then_serves_from_cache() {
        let server = MockServer::start().await;
        mount_jwks(&server, 1).await;
        let client = client_for(&server, Duration::from_secs(300));

        let key = client.get_key("sig-key-1").await.unwrap();
        assert_eq!(key.kty, "RSA");

        // Within the TTL: no further fetches
        client.get_key("sig-key-1").await.unwrap();
        client.get_key("enc-key-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_cache_fetches_again() {
        let server = MockServer::start().await;
        mount_jwks(&server, 2).await;
        let client = client_for(&server, Duration::from_millis(50));

        client.get_key("sig-key-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.get_key("sig-key-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_kid_on_fresh_cache_does_not_refetch() {
        let server = MockServer::start().await;
        mount_jwks(&server, 1).await;
        let client = client_for(&server, Duration::from_secs(300));

        client.get_key("sig-key-1").await.unwrap();

        let err = client.get_key("rotated-away").await.unwrap_err();
        assert_eq!(err, KeyCacheError::KeyNotFound("rotated-away".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_kid_on_cold_cache_fetches_exactly_once() {
        let server = MockServer::start().await;
        mount_jwks(&server, 1).await;
        let client = client_for(&server, Duration::from_secs(300));

        let err = client.get_key("missing").await.unwrap_err();
        assert_eq!(err, KeyCacheError::KeyNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_cold_cache_fetch_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_secs(300));

        let err = client.get_key("sig-key-1").await.unwrap_err();
        assert!(
            matches!(&err, KeyCacheError::FetchFailed(msg) if msg.contains("503")),
            "Expected FetchFailed, got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_invalid_jwks_document_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_secs(300));

        let err = client.get_key("sig-key-1").await.unwrap_err();
        assert!(matches!(err, KeyCacheError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_warm_cache_serves_stale_keys_when_refresh_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_millis(50));

        client.get_key("sig-key-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let key = client.get_key("sig-key-1").await.unwrap();
        assert_eq!(key.kid.as_deref(), Some("sig-key-1"));
    }

    #[tokio::test]
    async fn test_force_refresh_reports_failure_even_with_stale_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_secs(300));

        client.get_key("sig-key-1").await.unwrap();

        assert!(client.force_refresh().await.is_err());
        // Cached key set is untouched by the failed refresh
        client.get_key("sig-key-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_force_refresh_sharing_failed_lookup_refresh_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;
        let client = Arc::new(client_for(&server, Duration::from_millis(50)));

        client.get_key("sig-key-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Stale lookup starts the failing fetch; the forced refresh joins it
        let lookup = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_key("sig-key-1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let forced = client.force_refresh().await;

        assert!(
            matches!(forced, Err(KeyCacheError::FetchFailed(_))),
            "Expected FetchFailed, got {:?}",
            forced
        );
        assert!(lookup.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_failing_endpoint_not_retried_within_retry_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_millis(50));

        client.get_key("sig-key-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        for _ in 0..5 {
            client.get_key("sig-key-1").await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_retry_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(keycloak_jwks()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        let client = client_for(&server, Duration::from_millis(50));

        client.get_key("sig-key-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.get_key("sig-key-1").await.unwrap();

        assert!(client.force_refresh().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_cold_lookups_share_one_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(keycloak_jwks())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = Arc::new(client_for(&server, Duration::from_secs(300)));

        let lookups = (0..10).map(|_| {
            let client = Arc::clone(&client);
            async move { client.get_key("sig-key-1").await }
        });
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_abort_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CERTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(keycloak_jwks())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = Arc::new(client_for(&server, Duration::from_secs(300)));

        let caller = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_key("sig-key-1").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        caller.abort();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Populated by the refresh the cancelled caller started
        client.get_key("sig-key-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let server = MockServer::start().await;
        mount_jwks(&server, 2).await;
        let client = client_for(&server, Duration::from_secs(300));

        client.get_key("sig-key-1").await.unwrap();
        client.clear_cache().await;
        client.get_key("sig-key-1").await.unwrap();
    }
}
