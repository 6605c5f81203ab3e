//! Orphaned workspace sweep.
//!
//! Requests that crash before releasing their workspace leave directories
//! behind. The sweeper removes any workspace whose modification time is older
//! than the configured grace period.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use docmill_config::SweepPolicy;
use docmill_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::error::WorkspaceError;

/// Remove workspace directories older than `grace`.
///
/// Returns the number of directories removed. Individual removal failures are
/// logged and skipped so one stubborn entry cannot stall the sweep.
///
/// # Errors
///
/// Returns an error only if the workspace root itself cannot be read.
pub fn sweep_orphans(root: &Path, grace: Duration) -> Result<u64, WorkspaceError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(WorkspaceError::Io {
                operation: "sweep",
                path: root.to_path_buf(),
                source,
            });
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < grace {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                removed += 1;
                debug!(path = %path.display(), age_secs = age.as_secs(), "swept orphaned workspace");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to sweep orphaned workspace");
            }
        }
    }
    Ok(removed)
}

/// Periodic sweep loop intended to run as a background task.
///
/// Runs until the surrounding task is aborted (typically at shutdown).
pub async fn run_sweeper(policy: SweepPolicy, metrics: Metrics) {
    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match sweep_orphans(&policy.workspace_root, policy.grace) {
            Ok(0) => {}
            Ok(removed) => {
                metrics.add_workspaces_swept(removed);
                info!(removed, root = %policy.workspace_root.display(), "orphan sweep removed workspaces");
            }
            Err(err) => {
                warn!(error = %err, root = %policy.workspace_root.display(), "orphan sweep failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn missing_root_sweeps_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let removed =
            sweep_orphans(&tmp.path().join("absent"), Duration::from_secs(60)).expect("sweep");
        assert_eq!(removed, 0);
    }

    #[test]
    fn fresh_workspaces_survive_the_sweep() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path().join("recent");
        fs::create_dir(&workspace).expect("create");
        let removed = sweep_orphans(tmp.path(), Duration::from_secs(3600)).expect("sweep");
        assert_eq!(removed, 0);
        assert!(workspace.exists());
    }

    #[test]
    fn aged_workspaces_are_removed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path().join("stale");
        fs::create_dir(&workspace).expect("create");
        File::create(workspace.join("leftover.pdf")).expect("file");
        // Zero grace makes every existing directory eligible.
        let removed = sweep_orphans(tmp.path(), Duration::ZERO).expect("sweep");
        assert_eq!(removed, 1);
        assert!(!workspace.exists());
    }

    #[test]
    fn plain_files_in_the_root_are_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        File::create(tmp.path().join("stray.txt")).expect("file");
        let removed = sweep_orphans(tmp.path(), Duration::ZERO).expect("sweep");
        assert_eq!(removed, 0);
        assert!(tmp.path().join("stray.txt").exists());
    }
}
