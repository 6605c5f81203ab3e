//! Upload validation, ordered per the acceptance policy.
//!
//! Checks run in a fixed order: size, filename hygiene, extension allow-list,
//! then content sniffing. The sniffing mode is chosen once at construction,
//! not per request.

use docmill_config::UploadPolicy;
use tracing::warn;

use crate::error::ValidationError;
use crate::model::Operation;
use crate::sanitize::{sanitize_file_name, split_stem};
use crate::sniff::sniff;

/// Content verification mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffMode {
    /// Magic-byte inspection compares content against the claimed extension.
    Magic,
    /// Extensions are trusted without content inspection.
    ExtensionOnly,
}

/// Upload that passed every check and is ready to stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedUpload {
    /// Filename exactly as supplied by the client.
    pub original_name: String,
    /// Sanitized basename, safe to use inside a workspace.
    pub safe_name: String,
    /// Sanitized stem used to derive output names.
    pub stem: String,
    /// Lowercased extension.
    pub extension: String,
    /// Content type declared by the transport, if any.
    pub declared_mime: Option<String>,
    /// Upload size in bytes.
    pub size_bytes: u64,
}

/// Validates untrusted uploads against the configured acceptance policy.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_upload_bytes: u64,
    max_files_per_request: usize,
    mode: SniffMode,
}

impl UploadValidator {
    /// Build a validator from the upload policy, fixing the sniffing mode.
    #[must_use]
    pub fn new(policy: &UploadPolicy) -> Self {
        let mode = if policy.sniff_content {
            SniffMode::Magic
        } else {
            warn!("content sniffing disabled; uploads are trusted by extension only");
            SniffMode::ExtensionOnly
        };
        Self {
            max_upload_bytes: policy.max_upload_bytes,
            max_files_per_request: policy.max_files_per_request,
            mode,
        }
    }

    /// Active content verification mode.
    #[must_use]
    pub const fn mode(&self) -> SniffMode {
        self.mode
    }

    /// Configured per-upload size limit in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Reject a transport-declared size before reading any body bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooLarge`] when the declared size exceeds
    /// the limit.
    pub fn check_declared_size(&self, declared: Option<u64>) -> Result<(), ValidationError> {
        if let Some(size) = declared
            && size > self.max_upload_bytes
        {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Check the number of files against the request limit and the
    /// operation's arity.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TooManyFiles`] or
    /// [`ValidationError::NotEnoughFiles`].
    pub fn check_file_count(
        &self,
        operation: Operation,
        count: usize,
    ) -> Result<(), ValidationError> {
        if count > self.max_files_per_request
            || (!operation.multi_input() && count > operation.min_inputs())
        {
            let limit = if operation.multi_input() {
                self.max_files_per_request
            } else {
                operation.min_inputs()
            };
            return Err(ValidationError::TooManyFiles { count, limit });
        }
        if count < operation.min_inputs() {
            return Err(ValidationError::NotEnoughFiles {
                count,
                required: operation.min_inputs(),
            });
        }
        Ok(())
    }

    /// Run the full check sequence for one upload.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`ValidationError`].
    pub fn validate(
        &self,
        operation: Operation,
        original_name: Option<&str>,
        declared_mime: Option<&str>,
        bytes: &[u8],
    ) -> Result<CheckedUpload, ValidationError> {
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(ValidationError::EmptyUpload);
        }

        let original_name = original_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ValidationError::MissingFilename)?;
        let safe_name =
            sanitize_file_name(original_name).ok_or_else(|| ValidationError::UnsafeFilename {
                name: original_name.to_string(),
            })?;
        let (stem, extension) = split_stem(&safe_name);

        if !operation
            .allowed_extensions()
            .contains(&extension.as_str())
        {
            return Err(ValidationError::UnsupportedExtension {
                extension,
                operation: operation.as_str(),
            });
        }

        if self.mode == SniffMode::Magic {
            match sniff(bytes) {
                Some(kind) if kind.matches_extension(&extension) => {}
                Some(kind) => {
                    return Err(ValidationError::ContentMismatch {
                        extension,
                        detected: kind.as_str(),
                    });
                }
                None => {
                    return Err(ValidationError::ContentMismatch {
                        extension,
                        detected: "unknown",
                    });
                }
            }
        }

        Ok(CheckedUpload {
            original_name: original_name.to_string(),
            safe_name,
            stem,
            extension,
            declared_mime: declared_mime.map(ToString::to_string),
            size_bytes: size,
        })
    }
}
