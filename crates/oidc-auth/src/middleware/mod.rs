//! HTTP middleware.
//!
//! # Components
//!
//! - `auth` - Bearer authentication and role enforcement for protected routes

pub mod auth;

pub use auth::{require_auth, AuthContextExt, AuthState};
