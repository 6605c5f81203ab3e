//! Zip bundling for conversions that produce more than one output file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docmill_workspace::Workspace;
use tracing::debug;

use crate::error::ConversionError;
use crate::sanitize::derived_file_name;

/// MIME type served for bundled outputs.
pub const ZIP_MIME: &str = "application/zip";

/// Pack the given output files into a deflate-compressed zip inside the
/// workspace and return its path.
///
/// # Errors
///
/// Returns [`ConversionError::Io`] when the archive cannot be written, and
/// [`ConversionError::Workspace`] when the derived bundle name is rejected.
pub fn bundle_outputs(
    workspace: &Workspace,
    stem: &str,
    outputs: &[PathBuf],
) -> Result<PathBuf, ConversionError> {
    let bundle_name = derived_file_name(stem, "zip");
    let bundle_path = workspace.output_path(&bundle_name)?;

    let file = File::create(&bundle_path).map_err(|source| ConversionError::Io {
        operation: "create_bundle",
        path: bundle_path.clone(),
        source,
    })?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for path in outputs {
        let entry_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| bundle_failure(path, "output path has no usable file name"))?;
        zip.start_file(entry_name, options)
            .map_err(|err| bundle_failure(&bundle_path, &err.to_string()))?;
        let contents = fs::read(path).map_err(|source| ConversionError::Io {
            operation: "read_output",
            path: path.clone(),
            source,
        })?;
        zip.write_all(&contents)
            .map_err(|source| ConversionError::Io {
                operation: "write_bundle",
                path: bundle_path.clone(),
                source,
            })?;
    }
    zip.finish()
        .map_err(|err| bundle_failure(&bundle_path, &err.to_string()))?;

    debug!(entries = outputs.len(), bundle = %bundle_path.display(), "outputs bundled");
    Ok(bundle_path)
}

fn bundle_failure(path: &Path, detail: &str) -> ConversionError {
    ConversionError::Io {
        operation: "bundle",
        path: path.to_path_buf(),
        source: io::Error::other(detail.to_string()),
    }
}
