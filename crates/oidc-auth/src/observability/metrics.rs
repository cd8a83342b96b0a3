//! Metrics definitions for token validation and authorization.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, stale, error
//! - `error_category`: bounded by `TokenError::category`
//! - `outcome`: allowed, unauthenticated, forbidden, unavailable
//!
//! Key IDs, subjects and role names are never used as labels.

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS refresh attempt
///
/// Metric: `auth_jwks_refresh_total`, `auth_jwks_refresh_duration_seconds`
/// Labels: `status` (success, stale, error)
///
/// `stale` means the fetch failed but previously cached keys kept serving.
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("auth_jwks_refresh_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("auth_jwks_refresh_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record token validation result
///
/// Metric: `auth_token_validations_total`, `auth_token_validation_duration_seconds`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>, duration: Duration) {
    let category = error_category.unwrap_or("none");

    histogram!("auth_token_validation_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("auth_token_validations_total",
        "status" => status.to_string(),
        "error_category" => category.to_string()
    )
    .increment(1);
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record an authorization decision
///
/// Metric: `auth_authorization_decisions_total`
/// Labels: `outcome`
pub fn record_authorization(outcome: &str) {
    counter!("auth_authorization_decisions_total", "outcome" => outcome.to_string()).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder when none is installed.

    #[test]
    fn test_record_jwks_refresh() {
        record_jwks_refresh("success", Duration::from_millis(20));
        record_jwks_refresh("stale", Duration::from_millis(5000));
        record_jwks_refresh("error", Duration::from_millis(10));
    }

    #[test]
    fn test_record_token_validation() {
        record_token_validation("success", None, Duration::from_micros(300));
        record_token_validation("error", Some("expired"), Duration::from_micros(150));
        record_token_validation("error", Some("unknown_key"), Duration::from_millis(40));
    }

    #[test]
    fn test_record_authorization() {
        for outcome in ["allowed", "unauthenticated", "forbidden", "unavailable"] {
            record_authorization(outcome);
        }
    }

    #[test]
    fn test_metrics_recorded_with_expected_names() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        // Local recorder keeps this test independent of global state
        metrics::with_local_recorder(&recorder, || {
            record_jwks_refresh("success", Duration::from_millis(20));
            record_token_validation("error", Some("expired"), Duration::from_millis(1));
            record_token_validation("error", Some("expired"), Duration::from_millis(1));
            record_authorization("forbidden");
        });

        let metrics = snapshotter.snapshot().into_vec();

        let counter_value = |name: &str| {
            metrics
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(_, _, _, value)| value)
        };

        assert_eq!(
            counter_value("auth_jwks_refresh_total"),
            Some(&DebugValue::Counter(1))
        );
        assert_eq!(
            counter_value("auth_token_validations_total"),
            Some(&DebugValue::Counter(2))
        );
        assert_eq!(
            counter_value("auth_authorization_decisions_total"),
            Some(&DebugValue::Counter(1))
        );

        let validation_labels: Vec<(String, String)> = metrics
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "auth_token_validations_total")
            .map(|(key, _, _, _)| {
                key.key()
                    .labels()
                    .map(|label| (label.key().to_string(), label.value().to_string()))
                    .collect()
            })
            .unwrap();
        assert!(validation_labels.contains(&("error_category".to_string(), "expired".to_string())));
    }
}
