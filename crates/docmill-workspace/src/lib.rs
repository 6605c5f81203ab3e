#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Per-request workspace lifecycle: acquire, stage, release, sweep.
//!
//! # Design
//! - One workspace per request, uniquely named, access restricted.
//! - Release is best-effort and runs on every exit path; a dropped handle
//!   cleans up after itself and logs the leak.
//! - A periodic sweep removes workspaces orphaned by crashed requests.

mod error;
mod sweep;

use std::fs;
use std::path::{Component, Path, PathBuf};

use docmill_telemetry::Metrics;
use tracing::{debug, warn};
use uuid::Uuid;

pub use error::WorkspaceError;
pub use sweep::{run_sweeper, sweep_orphans};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Creates and releases per-request workspaces under a configured root.
#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    metrics: Metrics,
}

impl WorkspaceManager {
    /// Construct a manager rooted at the given directory.
    #[must_use]
    pub fn new(root: PathBuf, metrics: Metrics) -> Self {
        Self { root, metrics }
    }

    /// Root directory under which workspaces are created.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named workspace directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the root or the workspace directory cannot be
    /// created.
    pub fn acquire(&self) -> Result<Workspace, WorkspaceError> {
        fs::create_dir_all(&self.root).map_err(|source| WorkspaceError::Create {
            path: self.root.clone(),
            source,
        })?;

        let id = Uuid::new_v4();
        let dir = self.root.join(id.simple().to_string());
        fs::create_dir(&dir).map_err(|source| WorkspaceError::Create {
            path: dir.clone(),
            source,
        })?;
        restrict_permissions(&dir);

        self.metrics.inc_active_workspaces();
        debug!(workspace_id = %id, path = %dir.display(), "workspace acquired");
        Ok(Workspace {
            id,
            dir,
            metrics: self.metrics.clone(),
            released: false,
        })
    }
}

#[cfg(unix)]
fn restrict_permissions(dir: &Path) {
    if let Err(err) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
        warn!(path = %dir.display(), error = %err, "failed to restrict workspace permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_dir: &Path) {}

/// Handle to one per-request workspace directory.
pub struct Workspace {
    id: Uuid,
    dir: PathBuf,
    metrics: Metrics,
    released: bool,
}

impl Workspace {
    /// Unique identifier of this workspace.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Absolute path of the workspace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an upload into the workspace under the given file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name would escape the workspace root or the
    /// write fails.
    pub fn stage(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, WorkspaceError> {
        let path = self.resolve(file_name)?;
        fs::write(&path, bytes).map_err(|source| WorkspaceError::Io {
            operation: "stage",
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Reserve an output location inside the workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the name would escape the workspace root.
    pub fn output_path(&self, file_name: &str) -> Result<PathBuf, WorkspaceError> {
        self.resolve(file_name)
    }

    /// Whether the given path lies inside this workspace.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// List regular files currently present in the workspace, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| WorkspaceError::Io {
            operation: "list",
            path: self.dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WorkspaceError::Io {
                operation: "list",
                path: self.dir.clone(),
                source,
            })?;
            if entry.file_type().is_ok_and(|kind| kind.is_file()) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete the workspace directory and everything in it.
    ///
    /// Best-effort: failures (including the directory already being gone) are
    /// logged, never escalated, so cleanup cannot mask the request outcome.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.metrics.dec_active_workspaces();
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(workspace_id = %self.id, "workspace released"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(workspace_id = %self.id, path = %self.dir.display(), error = %err,
                    "failed to release workspace");
            }
        }
    }

    fn resolve(&self, file_name: &str) -> Result<PathBuf, WorkspaceError> {
        let candidate = Path::new(file_name);
        let mut components = candidate.components();
        let is_plain = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if !is_plain || file_name.is_empty() {
            return Err(WorkspaceError::OutsideRoot {
                name: file_name.to_string(),
            });
        }
        Ok(self.dir.join(file_name))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            warn!(workspace_id = %self.id, "workspace dropped without explicit release");
            self.release_inner();
        }
    }
}
