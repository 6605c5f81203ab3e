//! Error types for workspace lifecycle operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Creating the workspace directory failed.
    #[error("failed to create workspace directory")]
    Create {
        /// Directory that could not be created.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// A file name would resolve outside the workspace root.
    #[error("file name escapes the workspace root")]
    OutsideRoot {
        /// Offending file name.
        name: String,
    },
    /// A filesystem operation inside the workspace failed.
    #[error("workspace io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn errors_expose_sources() {
        let create = WorkspaceError::Create {
            path: PathBuf::from("/nowhere"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(create.to_string(), "failed to create workspace directory");
        assert!(create.source().is_some());

        let outside = WorkspaceError::OutsideRoot {
            name: "../escape".to_string(),
        };
        assert!(outside.source().is_none());
    }
}
