//! Shared HTTP constants (headers, form fields, problem URIs).

pub(crate) const HEADER_CSRF: &str = "x-docmill-csrf";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub(crate) const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const HEADER_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

pub(crate) const FIELD_FILE: &str = "file";
pub(crate) const FIELD_CSRF: &str = "csrf_token";
pub(crate) const FIELD_DPI: &str = "dpi";
pub(crate) const FIELD_PAGES: &str = "pages";
pub(crate) const FIELD_FORMAT: &str = "format";

pub(crate) const PROBLEM_INTERNAL: &str = "https://docmill.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://docmill.dev/problems/bad-request";
pub(crate) const PROBLEM_PAYLOAD_TOO_LARGE: &str = "https://docmill.dev/problems/payload-too-large";
pub(crate) const PROBLEM_UNSUPPORTED_MEDIA: &str = "https://docmill.dev/problems/unsupported-media";
pub(crate) const PROBLEM_UNPROCESSABLE_DOCUMENT: &str =
    "https://docmill.dev/problems/unprocessable-document";
pub(crate) const PROBLEM_RATE_LIMITED: &str = "https://docmill.dev/problems/rate-limited";
pub(crate) const PROBLEM_TOOL_FAILED: &str = "https://docmill.dev/problems/tool-failed";
pub(crate) const PROBLEM_TOOL_TIMEOUT: &str = "https://docmill.dev/problems/tool-timeout";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://docmill.dev/problems/service-unavailable";
