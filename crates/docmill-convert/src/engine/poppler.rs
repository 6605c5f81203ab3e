//! PDF rasterisation via the poppler `pdftoppm` subprocess boundary.

use std::ffi::OsString;

use async_trait::async_trait;
use docmill_config::ConvertPolicy;
use docmill_workspace::Workspace;
use tracing::debug;

use crate::engine::ConvertEngine;
use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, ImageFormat, Operation};
use crate::tool::ExternalTool;

/// Delegates PDF page rasterisation to `pdftoppm`, one output file per page.
pub(crate) struct PdfToImagesEngine {
    tool: ExternalTool,
    default_dpi: u32,
}

impl PdfToImagesEngine {
    pub(crate) fn new(policy: &ConvertPolicy) -> Self {
        Self {
            tool: ExternalTool::new(
                "pdftoppm",
                policy.pdftoppm_path.clone(),
                policy.tool_timeout,
            ),
            default_dpi: policy.default_dpi,
        }
    }
}

#[async_trait]
impl ConvertEngine for PdfToImagesEngine {
    fn operation(&self) -> Operation {
        Operation::PdfToImages
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let input = job.inputs.first().ok_or(ConversionError::Unsupported {
            detail: "pdf_to_images requires one staged input".to_string(),
        })?;
        let dpi = job.options.dpi.unwrap_or(self.default_dpi);
        let format = job.options.image_format;
        let prefix = format!("{}-page", input.stem);
        let prefix_path = workspace.output_path(&prefix)?;

        let mut args: Vec<OsString> = vec![
            OsString::from("-r"),
            OsString::from(dpi.to_string()),
            OsString::from(match format {
                ImageFormat::Png => "-png",
                ImageFormat::Jpeg => "-jpeg",
            }),
        ];
        if let Some(range) = job.options.pages {
            args.push(OsString::from("-f"));
            args.push(OsString::from(range.start.to_string()));
            args.push(OsString::from("-l"));
            args.push(OsString::from(range.end.to_string()));
        }
        args.push(input.staged_path.clone().into_os_string());
        args.push(prefix_path.into_os_string());

        self.tool.run(args, workspace.dir()).await?;

        let suffix = format!(".{}", format.extension());
        let mut outputs: Vec<_> = workspace
            .list_files()?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(&suffix))
            })
            .collect();
        outputs.sort();

        if outputs.is_empty() {
            // pdftoppm exits zero for some unreadable documents.
            return Err(ConversionError::MalformedInput {
                detail: "rasteriser produced no pages".to_string(),
            });
        }
        debug!(pages = outputs.len(), dpi, "pdf rasterised");

        Ok(ConversionResult {
            outputs,
            mime: format.mime(),
            extension: match format {
                ImageFormat::Png => "png",
                ImageFormat::Jpeg => "jpg",
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use docmill_telemetry::Metrics;
    use docmill_test_support::{pdf_with_pages, tool_available};
    use docmill_workspace::WorkspaceManager;

    use crate::model::{JobOptions, UploadDescriptor};

    fn policy() -> ConvertPolicy {
        ConvertPolicy {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            soffice_path: PathBuf::from("soffice"),
            tool_timeout: Duration::from_secs(60),
            default_dpi: 72,
            max_dpi: 600,
        }
    }

    #[tokio::test]
    async fn rasterises_one_image_per_page() {
        if !tool_available("pdftoppm", "-v") {
            return;
        }
        let tmp = tempfile::tempdir().expect("tempdir");
        let metrics = Metrics::new().expect("metrics");
        let manager = WorkspaceManager::new(tmp.path().join("work"), metrics);
        let workspace = manager.acquire().expect("workspace");

        let bytes = pdf_with_pages(3);
        let staged_path = workspace.stage("slides.pdf", &bytes).expect("stage");
        let job = ConversionJob {
            operation: Operation::PdfToImages,
            inputs: vec![UploadDescriptor {
                original_name: "slides.pdf".to_string(),
                stem: "slides".to_string(),
                extension: "pdf".to_string(),
                declared_mime: Some("application/pdf".to_string()),
                size_bytes: bytes.len() as u64,
                staged_path,
            }],
            options: JobOptions::default(),
        };

        let result = PdfToImagesEngine::new(&policy())
            .convert(&job, &workspace)
            .await
            .expect("rasterise");
        assert_eq!(result.outputs.len(), 3);
        assert_eq!(result.mime, "image/png");
        for output in &result.outputs {
            let name = output
                .file_name()
                .and_then(|name| name.to_str())
                .expect("output name");
            assert!(name.starts_with("slides-page"));
            assert!(name.ends_with(".png"));
        }
    }
}
