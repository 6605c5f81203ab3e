//! RFC9457-style API error wrapper and the domain-error mapping.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docmill_convert::{ConversionError, ValidationError};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_PAYLOAD_TOO_LARGE, PROBLEM_RATE_LIMITED,
    PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_TOOL_FAILED, PROBLEM_TOOL_TIMEOUT,
    PROBLEM_UNPROCESSABLE_DOCUMENT, PROBLEM_UNSUPPORTED_MEDIA,
};
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::models::ProblemDetails;

/// Structured API error rendered as a problem document.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    rate_limit: Option<ErrorRateLimitContext>,
}

#[derive(Debug)]
pub(crate) struct ErrorRateLimitContext {
    pub(crate) limit: u32,
    pub(crate) remaining: u32,
    pub(crate) retry_after: Option<Duration>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            rate_limit: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) const fn with_rate_limit_headers(
        mut self,
        limit: u32,
        remaining: u32,
        retry_after: Option<Duration>,
    ) -> Self {
        self.rate_limit = Some(ErrorRateLimitContext {
            limit,
            remaining,
            retry_after,
        });
        self
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            PROBLEM_PAYLOAD_TOO_LARGE,
            "upload too large",
        )
        .with_detail(detail)
    }

    pub(crate) fn unsupported_media(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PROBLEM_UNSUPPORTED_MEDIA,
            "unsupported media type",
        )
        .with_detail(detail)
    }

    pub(crate) fn unprocessable_document(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_UNPROCESSABLE_DOCUMENT,
            "document cannot be processed",
        )
        .with_detail(detail)
    }

    pub(crate) fn too_many_requests(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            PROBLEM_RATE_LIMITED,
            "rate limit exceeded",
        )
        .with_detail(detail)
    }

    pub(crate) fn tool_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_TOOL_FAILED,
            "conversion tool failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn tool_timeout(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            PROBLEM_TOOL_TIMEOUT,
            "conversion timed out",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }
}

impl From<&ValidationError> for ApiError {
    fn from(err: &ValidationError) -> Self {
        match err {
            ValidationError::TooLarge { size, limit } => Self::payload_too_large(format!(
                "upload of {size} bytes exceeds the {limit} byte limit"
            )),
            ValidationError::UnsupportedExtension {
                extension,
                operation,
            } => Self::unsupported_media(format!(
                "extension '{extension}' is not accepted by {operation}"
            )),
            ValidationError::ContentMismatch {
                extension,
                detected,
            } => Self::unsupported_media(format!(
                "content looks like {detected}, not a '{extension}' file"
            )),
            ValidationError::EmptyUpload
            | ValidationError::MissingFilename
            | ValidationError::UnsafeFilename { .. } => Self::bad_request(err.to_string()),
            ValidationError::TooManyFiles { count, limit } => Self::bad_request(format!(
                "received {count} files; this request accepts at most {limit}"
            )),
            ValidationError::NotEnoughFiles { count, required } => Self::bad_request(format!(
                "received {count} files; this operation requires at least {required}"
            )),
            ValidationError::InvalidOption { field, reason } => {
                Self::bad_request(format!("invalid '{field}' option: {reason}"))
            }
        }
    }
}

impl From<&ConversionError> for ApiError {
    fn from(err: &ConversionError) -> Self {
        match err {
            ConversionError::MalformedInput { detail } => {
                Self::unprocessable_document(format!("input document is malformed: {detail}"))
            }
            ConversionError::Unsupported { detail } => {
                Self::unprocessable_document(format!("conversion is not supported: {detail}"))
            }
            ConversionError::ToolFailed { tool, .. } => {
                Self::tool_failed(format!("{tool} failed to convert the document"))
            }
            ConversionError::ToolMissing { tool } => {
                Self::service_unavailable(format!("{tool} is not installed on this host"))
            }
            ConversionError::Timeout { tool, timeout } => Self::tool_timeout(format!(
                "{tool} exceeded the {}s limit",
                timeout.as_secs()
            )),
            ConversionError::Io { .. } | ConversionError::Workspace { .. } => {
                Self::internal("conversion failed unexpectedly")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(rate) = self.rate_limit {
            insert_rate_limit_headers(
                response.headers_mut(),
                rate.limit,
                rate.remaining,
                rate.retry_after,
            );
        }
        response
    }
}
