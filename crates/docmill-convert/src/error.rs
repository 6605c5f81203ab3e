//! Error taxonomy for upload validation and conversion.
//!
//! # Design
//! - `ValidationError` covers everything wrong with the request itself and is
//!   never retried.
//! - `ConversionError` covers delegated-capability failures and carries the
//!   cause so the HTTP layer can pick the right status.
//! - Constant messages; operational context lives in structured fields.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Upload rejected before any conversion work started.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Upload exceeds the configured size limit.
    #[error("upload exceeds the configured size limit")]
    TooLarge {
        /// Received (or transport-declared) size in bytes.
        size: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
    /// Upload carried no bytes.
    #[error("upload is empty")]
    EmptyUpload,
    /// No filename was supplied with the file part.
    #[error("upload is missing a filename")]
    MissingFilename,
    /// Filename sanitized down to nothing usable.
    #[error("filename contains no usable characters")]
    UnsafeFilename {
        /// Filename as supplied by the client.
        name: String,
    },
    /// Extension is not in the operation's allow-list.
    #[error("file extension is not allowed for this operation")]
    UnsupportedExtension {
        /// Lowercased extension from the upload.
        extension: String,
        /// Operation identifier.
        operation: &'static str,
    },
    /// Sniffed content does not match the claimed extension.
    #[error("file content does not match its extension")]
    ContentMismatch {
        /// Lowercased extension from the upload.
        extension: String,
        /// Content kind detected by the sniffer.
        detected: &'static str,
    },
    /// More files than the request limit allows.
    #[error("too many files in one request")]
    TooManyFiles {
        /// Number of files received.
        count: usize,
        /// Configured per-request limit.
        limit: usize,
    },
    /// Fewer files than the operation requires.
    #[error("operation requires more input files")]
    NotEnoughFiles {
        /// Number of files received.
        count: usize,
        /// Minimum required by the operation.
        required: usize,
    },
    /// A form option failed to parse or was out of range.
    #[error("invalid request option")]
    InvalidOption {
        /// Option field name.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
}

impl ValidationError {
    /// Short reason label used for the rejection metric.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "too_large",
            Self::EmptyUpload => "empty",
            Self::MissingFilename => "missing_filename",
            Self::UnsafeFilename { .. } => "unsafe_filename",
            Self::UnsupportedExtension { .. } => "unsupported_extension",
            Self::ContentMismatch { .. } => "content_mismatch",
            Self::TooManyFiles { .. } => "too_many_files",
            Self::NotEnoughFiles { .. } => "not_enough_files",
            Self::InvalidOption { .. } => "invalid_option",
        }
    }
}

/// Delegated conversion capability failed.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Input document could not be parsed by the delegated capability.
    #[error("input document is malformed")]
    MalformedInput {
        /// Parser detail.
        detail: String,
    },
    /// Input is valid but the requested transform is not supported for it.
    #[error("conversion is not supported for this input")]
    Unsupported {
        /// Capability detail.
        detail: String,
    },
    /// External tool exited with a failure status.
    #[error("external tool failed")]
    ToolFailed {
        /// Tool identifier.
        tool: &'static str,
        /// Exit code when the process terminated normally.
        status: Option<i32>,
        /// Captured stderr, truncated.
        stderr: String,
    },
    /// External tool binary could not be spawned.
    #[error("external tool is not available")]
    ToolMissing {
        /// Tool identifier.
        tool: &'static str,
    },
    /// External tool exceeded the wall-clock timeout and was killed.
    #[error("external tool timed out")]
    Timeout {
        /// Tool identifier.
        tool: &'static str,
        /// Configured timeout.
        timeout: Duration,
    },
    /// Filesystem operation inside the workspace failed mid-conversion.
    #[error("conversion io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Workspace refused a path (name escaped the root).
    #[error("workspace rejected a conversion path")]
    Workspace {
        /// Source workspace error.
        source: docmill_workspace::WorkspaceError,
    },
}

impl ConversionError {
    /// Short cause label used for the conversion metric.
    #[must_use]
    pub const fn cause(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_input",
            Self::Unsupported { .. } => "unsupported",
            Self::ToolFailed { .. } => "tool_failed",
            Self::ToolMissing { .. } => "tool_missing",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
            Self::Workspace { .. } => "workspace",
        }
    }
}

impl From<docmill_workspace::WorkspaceError> for ConversionError {
    fn from(source: docmill_workspace::WorkspaceError) -> Self {
        Self::Workspace { source }
    }
}
