//! Invariant checks applied to a resolved configuration snapshot.

use std::time::Duration;

use crate::error::ConfigError;
use crate::model::ConfigSnapshot;

const MIN_DPI: u32 = 16;
const MAX_DPI_CEILING: u32 = 1200;

/// Validate a resolved configuration snapshot.
///
/// # Errors
///
/// Returns the first violated invariant as a [`ConfigError::InvalidField`].
pub fn validate_snapshot(snapshot: &ConfigSnapshot) -> Result<(), ConfigError> {
    if snapshot.service.http_port == 0 {
        return Err(ConfigError::invalid(
            "http_port",
            "0",
            "port must be non-zero",
        ));
    }
    if snapshot.service.instance_name.trim().is_empty() {
        return Err(ConfigError::invalid(
            "instance_name",
            snapshot.service.instance_name.clone(),
            "instance name cannot be empty",
        ));
    }
    if snapshot.uploads.max_upload_bytes == 0 {
        return Err(ConfigError::invalid(
            "max_upload_bytes",
            "0",
            "upload limit must be positive",
        ));
    }
    if snapshot.uploads.max_files_per_request == 0 {
        return Err(ConfigError::invalid(
            "max_files_per_request",
            "0",
            "at least one file per request must be allowed",
        ));
    }
    if snapshot.convert.tool_timeout == Duration::ZERO {
        return Err(ConfigError::invalid(
            "tool_timeout_secs",
            "0",
            "tool timeout must be positive",
        ));
    }
    if snapshot.convert.default_dpi < MIN_DPI || snapshot.convert.default_dpi > MAX_DPI_CEILING {
        return Err(ConfigError::invalid(
            "default_dpi",
            snapshot.convert.default_dpi.to_string(),
            "dpi outside supported range",
        ));
    }
    if snapshot.convert.max_dpi < snapshot.convert.default_dpi
        || snapshot.convert.max_dpi > MAX_DPI_CEILING
    {
        return Err(ConfigError::invalid(
            "max_dpi",
            snapshot.convert.max_dpi.to_string(),
            "max dpi must be between default_dpi and the ceiling",
        ));
    }
    if snapshot.sweep.workspace_root.as_os_str().is_empty() {
        return Err(ConfigError::invalid(
            "workspace_root",
            "",
            "workspace root cannot be empty",
        ));
    }
    if snapshot.sweep.grace == Duration::ZERO {
        return Err(ConfigError::invalid(
            "sweep_grace_secs",
            "0",
            "sweep grace must be positive",
        ));
    }
    if snapshot.sweep.interval == Duration::ZERO {
        return Err(ConfigError::invalid(
            "sweep_interval_secs",
            "0",
            "sweep interval must be positive",
        ));
    }
    if snapshot.rate_limit.enabled {
        if snapshot.rate_limit.burst == 0 {
            return Err(ConfigError::invalid(
                "rate_burst",
                "0",
                "rate limit burst must be positive",
            ));
        }
        if snapshot.rate_limit.replenish_period == Duration::ZERO {
            return Err(ConfigError::invalid(
                "rate_period_secs",
                "0",
                "rate limit period must be positive",
            ));
        }
    }
    if snapshot.csrf.enforce && snapshot.csrf.token_ttl == Duration::ZERO {
        return Err(ConfigError::invalid(
            "csrf_ttl_secs",
            "0",
            "csrf token ttl must be positive when enforcement is on",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_with_lookup;

    fn valid_snapshot() -> ConfigSnapshot {
        load_with_lookup(|_| None).expect("defaults are valid")
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(validate_snapshot(&valid_snapshot()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut snapshot = valid_snapshot();
        snapshot.service.http_port = 0;
        let err = validate_snapshot(&snapshot).expect_err("invalid port");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "http_port",
                ..
            }
        ));
    }

    #[test]
    fn dpi_bounds_are_enforced() {
        let mut snapshot = valid_snapshot();
        snapshot.convert.default_dpi = 4;
        assert!(validate_snapshot(&snapshot).is_err());

        let mut snapshot = valid_snapshot();
        snapshot.convert.max_dpi = snapshot.convert.default_dpi - 1;
        assert!(validate_snapshot(&snapshot).is_err());
    }

    #[test]
    fn disabled_rate_limit_skips_bucket_checks() {
        let mut snapshot = valid_snapshot();
        snapshot.rate_limit.enabled = false;
        snapshot.rate_limit.burst = 0;
        assert!(validate_snapshot(&snapshot).is_ok());
    }

    #[test]
    fn empty_workspace_root_is_rejected() {
        let mut snapshot = valid_snapshot();
        snapshot.sweep.workspace_root = std::path::PathBuf::new();
        assert!(validate_snapshot(&snapshot).is_err());
    }
}
