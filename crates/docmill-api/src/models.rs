//! Shared HTTP DTOs for the docmill public API.

use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Stable problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short human-readable summary, constant per problem type.
    pub title: String,
    /// HTTP status code mirrored in the body.
    pub status: u16,
    /// Request-specific detail, when one is safe to surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Response body for `GET /v1/csrf`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfTokenResponse {
    /// Opaque anti-forgery token to echo back on conversion requests.
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in_secs: u64,
}
