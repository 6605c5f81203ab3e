//! Operation registry: one engine per operation, resolved at startup.

use std::collections::HashMap;
use std::sync::Arc;

use docmill_config::ConvertPolicy;
use docmill_workspace::Workspace;
use tracing::info;

use crate::engine::ConvertEngine;
use crate::engine::assemble::ImagesToPdfEngine;
use crate::engine::office::PdfToDocxEngine;
use crate::engine::pages::{PdfExtractEngine, PdfMergeEngine};
use crate::engine::poppler::PdfToImagesEngine;
use crate::error::ConversionError;
use crate::model::{ConversionJob, ConversionResult, Operation};

/// Routes validated jobs to the engine registered for their operation.
pub struct Dispatcher {
    engines: HashMap<Operation, Arc<dyn ConvertEngine>>,
}

impl Dispatcher {
    /// Build the registry with every supported engine.
    #[must_use]
    pub fn new(policy: &ConvertPolicy) -> Self {
        let engines: Vec<Arc<dyn ConvertEngine>> = vec![
            Arc::new(PdfToDocxEngine::new(policy)),
            Arc::new(PdfToImagesEngine::new(policy)),
            Arc::new(PdfMergeEngine),
            Arc::new(PdfExtractEngine),
            Arc::new(ImagesToPdfEngine),
        ];
        Self {
            engines: engines
                .into_iter()
                .map(|engine| (engine.operation(), engine))
                .collect(),
        }
    }

    /// Run one job to completion inside its workspace. No retries.
    ///
    /// # Errors
    ///
    /// Returns the engine's [`ConversionError`], or
    /// [`ConversionError::Unsupported`] when no engine is registered for the
    /// job's operation.
    pub async fn dispatch(
        &self,
        job: &ConversionJob,
        workspace: &Workspace,
    ) -> Result<ConversionResult, ConversionError> {
        let engine = self
            .engines
            .get(&job.operation)
            .ok_or_else(|| ConversionError::Unsupported {
                detail: format!("no engine registered for {}", job.operation.as_str()),
            })?;

        info!(
            operation = job.operation.as_str(),
            inputs = job.inputs.len(),
            workspace_id = %workspace.id(),
            "dispatching conversion"
        );
        let result = engine.convert(job, workspace).await?;
        info!(
            operation = job.operation.as_str(),
            outputs = result.outputs.len(),
            "conversion completed"
        );
        Ok(result)
    }
}
