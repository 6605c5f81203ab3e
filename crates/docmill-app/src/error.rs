//! # Design
//!
//! - Centralize application-level errors for the bootstrap sequence.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: docmill_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: docmill_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn api_server(operation: &'static str, source: anyhow::Error) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.load",
            docmill_config::ConfigError::InvalidField {
                field: "http_port",
                value: Some("bad".to_string()),
                reason: "expected a port number",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));

        let telemetry = AppError::telemetry("telemetry.init", anyhow!("boom"));
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let api = AppError::api_server("api.serve", anyhow!("bind failed"));
        assert!(matches!(api, AppError::ApiServer { .. }));
    }
}
