//! Built-in defaults applied before environment overrides.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{
    ConfigSnapshot, ConvertPolicy, CsrfPolicy, RateLimitPolicy, ServiceProfile, SweepPolicy,
    UploadPolicy,
};

pub(crate) const DEFAULT_HTTP_PORT: u16 = 8085;
pub(crate) const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_FILES_PER_REQUEST: usize = 20;
pub(crate) const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
pub(crate) const DEFAULT_DPI: u32 = 150;
pub(crate) const DEFAULT_MAX_DPI: u32 = 600;
pub(crate) const DEFAULT_SWEEP_GRACE_SECS: u64 = 3600;
pub(crate) const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
pub(crate) const DEFAULT_RATE_BURST: u32 = 10;
pub(crate) const DEFAULT_RATE_PERIOD_SECS: u64 = 60;
pub(crate) const DEFAULT_CSRF_TTL_SECS: u64 = 900;

pub(crate) fn snapshot() -> ConfigSnapshot {
    ConfigSnapshot {
        service: ServiceProfile {
            instance_name: "docmill".to_string(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            log_level: "info".to_string(),
            log_format: None,
        },
        uploads: UploadPolicy {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_files_per_request: DEFAULT_MAX_FILES_PER_REQUEST,
            sniff_content: true,
        },
        convert: ConvertPolicy {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            soffice_path: PathBuf::from("soffice"),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            default_dpi: DEFAULT_DPI,
            max_dpi: DEFAULT_MAX_DPI,
        },
        sweep: SweepPolicy {
            workspace_root: std::env::temp_dir().join("docmill"),
            grace: Duration::from_secs(DEFAULT_SWEEP_GRACE_SECS),
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        },
        rate_limit: RateLimitPolicy {
            enabled: true,
            burst: DEFAULT_RATE_BURST,
            replenish_period: Duration::from_secs(DEFAULT_RATE_PERIOD_SECS),
        },
        csrf: CsrfPolicy {
            enforce: false,
            token_ttl: Duration::from_secs(DEFAULT_CSRF_TTL_SECS),
        },
    }
}
