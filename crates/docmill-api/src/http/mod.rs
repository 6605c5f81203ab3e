//! HTTP surface modules (router, handlers, middleware).

/// Shared constants and header names for HTTP surfaces.
pub(crate) mod constants;
/// Conversion upload handlers and the request pipeline.
pub(crate) mod convert;
/// Anti-forgery token issuance and verification.
pub(crate) mod csrf;
/// Problem response helpers and error types.
pub(crate) mod errors;
/// Health and diagnostics endpoints.
pub(crate) mod health;
/// Per-client token bucket middleware.
pub(crate) mod rate_limit;
/// Router construction and server host.
pub(crate) mod router;
/// Metrics middleware for HTTP requests.
pub(crate) mod telemetry;
