//! PDF to editable DOCX via the LibreOffice subprocess boundary.

use async_trait::async_trait;
use docmill_config::ConvertPolicy;
use docmill_workspace::Workspace;
use tracing::debug;

use crate::engine::ConvertEngine;
use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, Operation};
use crate::sanitize::derived_file_name;
use crate::tool::ExternalTool;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Delegates PDF to DOCX conversion to `soffice --headless --convert-to`.
pub(crate) struct PdfToDocxEngine {
    tool: ExternalTool,
}

impl PdfToDocxEngine {
    pub(crate) fn new(policy: &ConvertPolicy) -> Self {
        Self {
            tool: ExternalTool::new(
                "soffice",
                policy.soffice_path.clone(),
                policy.tool_timeout,
            ),
        }
    }
}

#[async_trait]
impl ConvertEngine for PdfToDocxEngine {
    fn operation(&self) -> Operation {
        Operation::PdfToDocx
    }

    async fn convert(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let input = job.inputs.first().ok_or(ConversionError::Unsupported {
            detail: "pdf_to_docx requires one staged input".to_string(),
        })?;

        // soffice writes <input stem>.docx into --outdir.
        self.tool
            .run(
                [
                    "--headless".as_ref(),
                    "--convert-to".as_ref(),
                    "docx".as_ref(),
                    "--outdir".as_ref(),
                    workspace.dir().as_os_str(),
                    input.staged_path.as_os_str(),
                ],
                workspace.dir(),
            )
            .await?;

        let expected = workspace.output_path(&derived_file_name(&input.stem, "docx"))?;
        if !expected.is_file() {
            return Err(ConversionError::ToolFailed {
                tool: self.tool.name(),
                status: None,
                stderr: "converter exited successfully but produced no document".to_string(),
            });
        }
        debug!(output = %expected.display(), "pdf converted to docx");

        Ok(ConversionResult {
            outputs: vec![expected],
            mime: DOCX_MIME,
            extension: "docx",
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

    #[tokio::test]
    async fn converts_a_pdf_into_a_docx_named_after_the_input() {
        if !tool_available("soffice", "--version") {
            return;
        }
        let tmp = tempfile::tempdir().expect("tempdir");
        let metrics = Metrics::new().expect("metrics");
        let manager = WorkspaceManager::new(tmp.path().join("work"), metrics);
        let workspace = manager.acquire().expect("workspace");

        let bytes = pdf_with_pages(1);
        let staged_path = workspace.stage("report.pdf", &bytes).expect("stage");
        let job = ConversionJob {
            operation: Operation::PdfToDocx,
            inputs: vec![UploadDescriptor {
                original_name: "report.pdf".to_string(),
                stem: "report".to_string(),
                extension: "pdf".to_string(),
                declared_mime: Some("application/pdf".to_string()),
                size_bytes: bytes.len() as u64,
                staged_path,
            }],
            options: JobOptions::default(),
        };

        let policy = ConvertPolicy {
            pdftoppm_path: PathBuf::from("pdftoppm"),
            soffice_path: PathBuf::from("soffice"),
            tool_timeout: Duration::from_secs(120),
            default_dpi: 150,
            max_dpi: 600,
        };
        let result = PdfToDocxEngine::new(&policy)
            .convert(&job, &workspace)
            .await
            .expect("convert");
        assert_eq!(result.outputs.len(), 1);
        assert!(result.outputs[0].ends_with("report.docx"));
    }
}
