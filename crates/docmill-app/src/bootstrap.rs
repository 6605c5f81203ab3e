//! Environment loading and service wiring for the binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use docmill_api::ApiServer;
use docmill_config::{ConfigSnapshot, load_from_env};
use docmill_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use docmill_workspace::{WorkspaceManager, run_sweeper};
use tracing::info;

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the Docmill application.
pub(crate) struct BootstrapDependencies {
    snapshot: ConfigSnapshot,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let snapshot = load_from_env().map_err(|err| AppError::config("config.load", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            snapshot,
            telemetry,
        })
    }
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or server startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        snapshot,
        telemetry,
    } = dependencies;

    let format = snapshot
        .service
        .log_format
        .as_deref()
        .map_or_else(LogFormat::infer, LogFormat::parse);
    let logging = LoggingConfig {
        level: &snapshot.service.log_level,
        format,
        build_sha: build_sha(),
    };
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(
        instance = %snapshot.service.instance_name,
        "Docmill application bootstrap starting"
    );

    let workspaces = WorkspaceManager::new(
        snapshot.sweep.workspace_root.clone(),
        telemetry.clone(),
    );
    let sweeper = tokio::spawn(run_sweeper(snapshot.sweep.clone(), telemetry.clone()));
    info!("Orphaned workspace sweeper ready");

    let addr = SocketAddr::new(snapshot.service.bind_addr, snapshot.service.http_port);
    let server = ApiServer::new(Arc::new(snapshot), workspaces, telemetry);
    let serve_result = server
        .serve(addr)
        .await
        .map_err(|err| AppError::api_server("api.serve", err));
    sweeper.abort();
    serve_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_build_from_a_default_environment() {
        let dependencies = BootstrapDependencies::from_env().expect("defaults are valid");
        assert!(dependencies.snapshot.service.http_port > 0);
        assert!(dependencies.snapshot.uploads.max_upload_bytes > 0);
    }
}
