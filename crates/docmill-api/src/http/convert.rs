//! Conversion endpoints: multipart intake, validation, staging, dispatch,
//! and result streaming.
//!
//! Every request walks the same pipeline: received, validated, staged,
//! converted, streamed, cleaned. The workspace is released on every exit
//! path; outputs are buffered into memory before release so the response
//! body never references deleted files.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use docmill_config::ConvertPolicy;
use docmill_convert::{
    CheckedUpload, ConversionJob, JobOptions, Operation, UploadDescriptor, ValidationError,
    ZIP_MIME, bundle_outputs, derived_file_name,
};
use docmill_workspace::Workspace;
use tracing::{debug, error, warn};

use crate::http::constants::{FIELD_CSRF, FIELD_DPI, FIELD_FILE, FIELD_FORMAT, FIELD_PAGES};
use crate::http::csrf::verify_csrf;
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Pipeline phase recorded on transitions and in failure logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Validated,
    Staged,
    Converted,
    Streamed,
    Cleaned,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Staged => "staged",
            Self::Converted => "converted",
            Self::Streamed => "streamed",
            Self::Cleaned => "cleaned",
        }
    }
}

fn advance(phase: &mut Phase, next: Phase, operation: Operation) {
    *phase = next;
    debug!(
        operation = operation.as_str(),
        phase = next.as_str(),
        "pipeline phase"
    );
}

#[derive(Default)]
struct CollectedRequest {
    files: Vec<RawUpload>,
    dpi: Option<String>,
    pages: Option<String>,
    format: Option<String>,
    csrf_token: Option<String>,
}

struct RawUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Streamed conversion output, fully buffered.
struct Artifact {
    bytes: Vec<u8>,
    mime: &'static str,
    file_name: String,
}

/// Allowance subtracted from `Content-Length` for multipart boundaries and
/// text fields before comparing against the per-file limit.
const MULTIPART_ENVELOPE_SLACK: u64 = 16 * 1024;

pub(crate) async fn convert_pdf_to_docx(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_conversion(&state, Operation::PdfToDocx, &headers, multipart).await
}

pub(crate) async fn convert_pdf_to_images(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_conversion(&state, Operation::PdfToImages, &headers, multipart).await
}

pub(crate) async fn convert_pdf_merge(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_conversion(&state, Operation::PdfMerge, &headers, multipart).await
}

pub(crate) async fn convert_pdf_extract(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_conversion(&state, Operation::PdfExtract, &headers, multipart).await
}

pub(crate) async fn convert_images_to_pdf(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_conversion(&state, Operation::ImagesToPdf, &headers, multipart).await
}

async fn run_conversion(
    state: &ApiState,
    operation: Operation,
    headers: &HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut phase = Phase::Received;
    debug!(
        operation = operation.as_str(),
        phase = phase.as_str(),
        "pipeline phase"
    );

    // Single-input requests carry essentially one file, so a declared length
    // over the per-file limit is rejected before any body bytes are buffered.
    // Multi-input bodies may legitimately exceed it; the router's whole-body
    // ceiling bounds those.
    if !operation.multi_input() {
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(|length| length.saturating_sub(MULTIPART_ENVELOPE_SLACK));
        state.validator.check_declared_size(declared).map_err(|err| {
            state.telemetry.observe_upload_rejected(err.reason());
            warn!(
                operation = operation.as_str(),
                phase = phase.as_str(),
                reason = err.reason(),
                "declared request size rejected"
            );
            ApiError::from(&err)
        })?;
    }

    let collected = collect_request(multipart).await?;
    verify_csrf(state, headers, collected.csrf_token.as_deref())?;

    let checked = validate_uploads(state, operation, &collected).map_err(|err| {
        state.telemetry.observe_upload_rejected(err.reason());
        warn!(
            operation = operation.as_str(),
            phase = phase.as_str(),
            reason = err.reason(),
            "upload rejected"
        );
        ApiError::from(&err)
    })?;
    let options = parse_options(&state.config.convert, operation, &collected).map_err(|err| {
        state.telemetry.observe_upload_rejected(err.reason());
        warn!(
            operation = operation.as_str(),
            phase = phase.as_str(),
            reason = err.reason(),
            "request options rejected"
        );
        ApiError::from(&err)
    })?;
    advance(&mut phase, Phase::Validated, operation);

    let workspace = state.workspaces.acquire().map_err(|err| {
        error!(operation = operation.as_str(), error = %err, "failed to acquire workspace");
        ApiError::service_unavailable("temporary storage is unavailable")
    })?;

    let outcome = execute(
        state, operation, &collected, &checked, options, &mut phase, &workspace,
    )
    .await;
    workspace.release();
    advance(&mut phase, Phase::Cleaned, operation);

    let artifact = outcome?;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.mime)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        )
        .body(Body::from(artifact.bytes))
        .map_err(|err| {
            error!(error = %err, "failed to build conversion response");
            ApiError::internal("failed to build response")
        })
}

async fn execute(
    state: &ApiState,
    operation: Operation,
    collected: &CollectedRequest,
    checked: &[CheckedUpload],
    options: JobOptions,
    phase: &mut Phase,
    workspace: &Workspace,
) -> Result<Artifact, ApiError> {
    // Multi-input uploads are staged under index-prefixed names so duplicate
    // client filenames cannot collide; single inputs keep their sanitized name
    // because subprocess converters derive output names from it.
    let multi = operation.multi_input();
    let mut inputs = Vec::with_capacity(checked.len());
    for (index, (check, upload)) in checked.iter().zip(&collected.files).enumerate() {
        let staged_name = if multi {
            format!("{index:02}-{}", check.safe_name)
        } else {
            check.safe_name.clone()
        };
        let staged_path = workspace
            .stage(&staged_name, &upload.bytes)
            .map_err(|err| {
                error!(
                    operation = operation.as_str(),
                    phase = phase.as_str(),
                    error = %err,
                    "failed to stage upload"
                );
                ApiError::internal("failed to stage upload")
            })?;
        inputs.push(UploadDescriptor {
            original_name: check.original_name.clone(),
            stem: check.stem.clone(),
            extension: check.extension.clone(),
            declared_mime: check.declared_mime.clone(),
            size_bytes: check.size_bytes,
            staged_path,
        });
    }
    advance(phase, Phase::Staged, operation);

    let job = ConversionJob {
        operation,
        inputs,
        options,
    };
    let result = match state.dispatcher.dispatch(&job, workspace).await {
        Ok(result) => {
            state
                .telemetry
                .observe_conversion(operation.as_str(), "completed");
            result
        }
        Err(err) => {
            state
                .telemetry
                .observe_conversion(operation.as_str(), err.cause());
            error!(
                operation = operation.as_str(),
                phase = phase.as_str(),
                error = %err,
                "conversion failed"
            );
            return Err(ApiError::from(&err));
        }
    };
    advance(phase, Phase::Converted, operation);

    let artifact = if let [output] = result.outputs.as_slice() {
        let bytes = tokio::fs::read(output).await.map_err(|err| {
            error!(path = %output.display(), error = %err, "failed to read conversion output");
            ApiError::internal("failed to read conversion output")
        })?;
        let file_name = output
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(
                || derived_file_name(job.output_stem(), result.extension),
                ToString::to_string,
            );
        Artifact {
            bytes,
            mime: result.mime,
            file_name,
        }
    } else {
        let bundle =
            bundle_outputs(workspace, job.output_stem(), &result.outputs).map_err(|err| {
                error!(error = %err, "failed to bundle conversion outputs");
                ApiError::internal("failed to bundle conversion outputs")
            })?;
        let bytes = tokio::fs::read(&bundle).await.map_err(|err| {
            error!(path = %bundle.display(), error = %err, "failed to read output bundle");
            ApiError::internal("failed to read output bundle")
        })?;
        let file_name = bundle
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(
                || derived_file_name(job.output_stem(), "zip"),
                ToString::to_string,
            );
        Artifact {
            bytes,
            mime: ZIP_MIME,
            file_name,
        }
    };
    advance(phase, Phase::Streamed, operation);
    Ok(artifact)
}

async fn collect_request(mut multipart: Multipart) -> Result<CollectedRequest, ApiError> {
    let mut collected = CollectedRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            FIELD_FILE => {
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(multipart_failure)?.to_vec();
                collected.files.push(RawUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            FIELD_DPI => collected.dpi = Some(field.text().await.map_err(multipart_failure)?),
            FIELD_PAGES => collected.pages = Some(field.text().await.map_err(multipart_failure)?),
            FIELD_FORMAT => {
                collected.format = Some(field.text().await.map_err(multipart_failure)?);
            }
            FIELD_CSRF => {
                collected.csrf_token = Some(field.text().await.map_err(multipart_failure)?);
            }
            _ => {}
        }
    }
    Ok(collected)
}

fn multipart_failure(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("request body exceeds the configured limit")
    } else {
        ApiError::bad_request("malformed multipart body")
    }
}

fn validate_uploads(
    state: &ApiState,
    operation: Operation,
    collected: &CollectedRequest,
) -> Result<Vec<CheckedUpload>, ValidationError> {
    state
        .validator
        .check_file_count(operation, collected.files.len())?;
    collected
        .files
        .iter()
        .map(|upload| {
            state.validator.validate(
                operation,
                upload.file_name.as_deref(),
                upload.content_type.as_deref(),
                &upload.bytes,
            )
        })
        .collect()
}

fn parse_options(
    policy: &ConvertPolicy,
    operation: Operation,
    collected: &CollectedRequest,
) -> Result<JobOptions, ValidationError> {
    let mut options = JobOptions::default();

    if let Some(text) = &collected.dpi {
        let dpi: u32 = text
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidOption {
                field: "dpi",
                reason: "expected a positive integer",
            })?;
        if dpi == 0 || dpi > policy.max_dpi {
            return Err(ValidationError::InvalidOption {
                field: "dpi",
                reason: "outside the allowed range",
            });
        }
        options.dpi = Some(dpi);
    }
    if let Some(text) = &collected.pages {
        options.pages = Some(text.parse()?);
    }
    if let Some(text) = &collected.format {
        options.image_format = text.parse()?;
    }
    if operation == Operation::PdfExtract && options.pages.is_none() {
        return Err(ValidationError::InvalidOption {
            field: "pages",
            reason: "required for page extraction",
        });
    }

    Ok(options)
}
