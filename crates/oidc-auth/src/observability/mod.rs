//! Observability for token validation and authorization.
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and log only
//! bounded fields:
//! - **SAFE**: error categories, key IDs, role names, outcome labels
//! - **NEVER**: raw tokens, the Authorization header, subject or email
//!
//! Metrics go through the `metrics` facade; the embedding service installs
//! the exporter.

pub mod metrics;
