//! Configuration data carriers.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Immutable configuration snapshot shared across the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Service identity and bind settings.
    pub service: ServiceProfile,
    /// Upload acceptance policy.
    pub uploads: UploadPolicy,
    /// Conversion engine settings.
    pub convert: ConvertPolicy,
    /// Workspace root and orphan sweep settings.
    pub sweep: SweepPolicy,
    /// Per-client rate limiting settings.
    pub rate_limit: RateLimitPolicy,
    /// Anti-forgery token settings.
    pub csrf: CsrfPolicy,
}

/// Service identity and HTTP bind settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceProfile {
    /// Friendly identifier recorded in logs.
    pub instance_name: String,
    /// IP address the API server binds to.
    pub bind_addr: IpAddr,
    /// TCP port the API server binds to.
    pub http_port: u16,
    /// Log level applied when `RUST_LOG` is absent.
    pub log_level: String,
    /// Log output format (`json` or `pretty`); inferred from the build when
    /// absent.
    pub log_format: Option<String>,
}

/// Upload acceptance policy enforced before any disk write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Maximum accepted upload size, in bytes.
    pub max_upload_bytes: u64,
    /// Maximum number of files accepted in one request.
    pub max_files_per_request: usize,
    /// Whether magic-byte content sniffing is enabled. When disabled the
    /// validator trusts extensions only and logs a warning at startup.
    pub sniff_content: bool,
}

/// Conversion engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvertPolicy {
    /// Path to the `pdftoppm` binary used for PDF rasterisation.
    pub pdftoppm_path: PathBuf,
    /// Path to the `soffice` binary used for PDF to DOCX conversion.
    pub soffice_path: PathBuf,
    /// Wall-clock timeout applied to every external tool invocation.
    pub tool_timeout: Duration,
    /// DPI used for rasterisation when the client does not specify one.
    pub default_dpi: u32,
    /// Upper bound on client-requested DPI.
    pub max_dpi: u32,
}

/// Workspace root and orphan sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Directory under which per-request workspaces are created.
    pub workspace_root: PathBuf,
    /// Age past which an unreleased workspace is considered orphaned.
    pub grace: Duration,
    /// Interval between sweep passes.
    pub interval: Duration,
}

/// Token-bucket rate limiting keyed on the client address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Whether rate limiting is enforced.
    pub enabled: bool,
    /// Bucket capacity: requests admitted in a burst.
    pub burst: u32,
    /// Period over which a full bucket is replenished.
    pub replenish_period: Duration,
}

/// Anti-forgery token settings for browser-originated submissions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsrfPolicy {
    /// Whether conversion endpoints require a CSRF token.
    pub enforce: bool,
    /// Lifetime of an issued token.
    pub token_ttl: Duration,
}
