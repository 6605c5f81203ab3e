//! Environment-backed configuration loading.
//!
//! Defaults are applied first; any `DOCMILL_*` variable present in the
//! environment overrides the matching field. The resolved snapshot is
//! validated before it is returned.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::defaults;
use crate::error::ConfigError;
use crate::model::ConfigSnapshot;
use crate::validate::validate_snapshot;

/// Load configuration from process environment variables.
///
/// # Errors
///
/// Returns an error if an override fails to parse or the resolved snapshot
/// violates a configuration invariant.
pub fn load_from_env() -> Result<ConfigSnapshot, ConfigError> {
    load_with_lookup(|name| std::env::var(name).ok())
}

/// Load configuration through an injectable variable lookup.
///
/// Used by tests to exercise overrides without touching process state.
///
/// # Errors
///
/// Returns an error if an override fails to parse or the resolved snapshot
/// violates a configuration invariant.
pub fn load_with_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ConfigSnapshot, ConfigError> {
    let mut snapshot = defaults::snapshot();

    if let Some(value) = lookup("DOCMILL_INSTANCE_NAME") {
        snapshot.service.instance_name = value;
    }
    if let Some(value) = lookup("DOCMILL_BIND_ADDR") {
        snapshot.service.bind_addr = parse("bind_addr", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_HTTP_PORT") {
        snapshot.service.http_port = parse("http_port", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_LOG_LEVEL") {
        snapshot.service.log_level = value;
    }
    if let Some(value) = lookup("DOCMILL_LOG_FORMAT") {
        snapshot.service.log_format = Some(value);
    }

    if let Some(value) = lookup("DOCMILL_MAX_UPLOAD_BYTES") {
        snapshot.uploads.max_upload_bytes = parse("max_upload_bytes", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_MAX_FILES_PER_REQUEST") {
        snapshot.uploads.max_files_per_request = parse("max_files_per_request", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_SNIFF_CONTENT") {
        snapshot.uploads.sniff_content = parse_bool("sniff_content", &value)?;
    }

    if let Some(value) = lookup("DOCMILL_PDFTOPPM_PATH") {
        snapshot.convert.pdftoppm_path = PathBuf::from(value);
    }
    if let Some(value) = lookup("DOCMILL_SOFFICE_PATH") {
        snapshot.convert.soffice_path = PathBuf::from(value);
    }
    if let Some(value) = lookup("DOCMILL_TOOL_TIMEOUT_SECS") {
        snapshot.convert.tool_timeout = parse_secs("tool_timeout_secs", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_DEFAULT_DPI") {
        snapshot.convert.default_dpi = parse("default_dpi", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_MAX_DPI") {
        snapshot.convert.max_dpi = parse("max_dpi", &value)?;
    }

    if let Some(value) = lookup("DOCMILL_WORKSPACE_ROOT") {
        snapshot.sweep.workspace_root = PathBuf::from(value);
    }
    if let Some(value) = lookup("DOCMILL_SWEEP_GRACE_SECS") {
        snapshot.sweep.grace = parse_secs("sweep_grace_secs", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_SWEEP_INTERVAL_SECS") {
        snapshot.sweep.interval = parse_secs("sweep_interval_secs", &value)?;
    }

    if let Some(value) = lookup("DOCMILL_RATE_LIMIT_ENABLED") {
        snapshot.rate_limit.enabled = parse_bool("rate_limit_enabled", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_RATE_BURST") {
        snapshot.rate_limit.burst = parse("rate_burst", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_RATE_PERIOD_SECS") {
        snapshot.rate_limit.replenish_period = parse_secs("rate_period_secs", &value)?;
    }

    if let Some(value) = lookup("DOCMILL_CSRF_ENFORCE") {
        snapshot.csrf.enforce = parse_bool("csrf_enforce", &value)?;
    }
    if let Some(value) = lookup("DOCMILL_CSRF_TTL_SECS") {
        snapshot.csrf.token_ttl = parse_secs("csrf_ttl_secs", &value)?;
    }

    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

fn parse<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "failed to parse override"))
}

fn parse_secs(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse::<u64>(field, value).map(Duration::from_secs)
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(
            field,
            other,
            "expected a boolean flag",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&'a str, &'a str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(ToString::to_string)
    }

    #[test]
    fn defaults_load_without_overrides() {
        let snapshot = load_with_lookup(|_| None).expect("defaults are valid");
        assert_eq!(snapshot.service.http_port, defaults::DEFAULT_HTTP_PORT);
        assert!(snapshot.uploads.sniff_content);
        assert!(snapshot.rate_limit.enabled);
    }

    #[test]
    fn overrides_replace_defaults() {
        let snapshot = load_with_lookup(lookup_from(&[
            ("DOCMILL_HTTP_PORT", "9090"),
            ("DOCMILL_MAX_UPLOAD_BYTES", "1048576"),
            ("DOCMILL_SNIFF_CONTENT", "off"),
            ("DOCMILL_RATE_BURST", "3"),
            ("DOCMILL_WORKSPACE_ROOT", "/var/tmp/docmill"),
        ]))
        .expect("overrides are valid");
        assert_eq!(snapshot.service.http_port, 9090);
        assert_eq!(snapshot.uploads.max_upload_bytes, 1_048_576);
        assert!(!snapshot.uploads.sniff_content);
        assert_eq!(snapshot.rate_limit.burst, 3);
        assert_eq!(
            snapshot.sweep.workspace_root,
            PathBuf::from("/var/tmp/docmill")
        );
    }

    #[test]
    fn malformed_override_is_rejected() {
        let err = load_with_lookup(lookup_from(&[("DOCMILL_HTTP_PORT", "not-a-port")]))
            .expect_err("parse failure");
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "http_port",
                ..
            }
        ));
    }

    #[test]
    fn boolean_flags_accept_common_spellings() {
        for value in ["1", "true", "yes", "on"] {
            assert!(parse_bool("flag", value).expect("truthy"));
        }
        for value in ["0", "false", "no", "off"] {
            assert!(!parse_bool("flag", value).expect("falsy"));
        }
        assert!(parse_bool("flag", "maybe").is_err());
    }
}
