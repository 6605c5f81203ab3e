//! Error types for configuration operations.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.into()),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_field_carries_context() {
        let err = ConfigError::invalid("http_port", "0", "port must be non-zero");
        assert_eq!(err.to_string(), "invalid configuration field");
        let ConfigError::InvalidField { field, value, reason } = err;
        assert_eq!(field, "http_port");
        assert_eq!(value.as_deref(), Some("0"));
        assert_eq!(reason, "port must be non-zero");
    }
}
