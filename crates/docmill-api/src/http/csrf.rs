//! Anti-forgery token issuance and verification for browser submissions.

use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use tracing::debug;

use crate::http::constants::HEADER_CSRF;
use crate::http::errors::ApiError;
use crate::models::CsrfTokenResponse;
use crate::state::ApiState;

/// `GET /v1/csrf` — mint a token for subsequent conversion requests.
pub(crate) async fn issue_csrf(State(state): State<Arc<ApiState>>) -> Json<CsrfTokenResponse> {
    let (token, ttl) = state.issue_csrf_token();
    debug!("csrf token issued");
    Json(CsrfTokenResponse {
        token,
        expires_in_secs: ttl.as_secs(),
    })
}

/// Verify the anti-forgery token on a conversion request.
///
/// The token is accepted from the `x-docmill-csrf` header or, failing that,
/// from the `csrf_token` form field already collected from the multipart body.
/// A no-op when enforcement is disabled in config.
pub(crate) fn verify_csrf(
    state: &ApiState,
    headers: &HeaderMap,
    form_token: Option<&str>,
) -> Result<(), ApiError> {
    if !state.config.csrf.enforce {
        return Ok(());
    }

    let header_token = headers.get(HEADER_CSRF).and_then(|value| value.to_str().ok());
    let token = header_token
        .or(form_token)
        .ok_or_else(|| ApiError::bad_request("missing anti-forgery token"))?;

    if state.csrf_token_valid(token) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "anti-forgery token is invalid or expired",
        ))
    }
}
