//! HTTP surface for zapbridge.
//!
//! Thin axum layer over the session core: routing, request validation, and
//! error-to-status mapping live here; all semantics live in the core.

pub mod error;
pub mod routes;

pub use {
    error::ApiError,
    routes::{AppState, router},
};
