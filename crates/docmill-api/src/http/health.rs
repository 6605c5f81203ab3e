//! Health and diagnostics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use docmill_convert::ExternalTool;
use docmill_telemetry::{MetricsSnapshot, build_sha};
use serde::Serialize;
use tracing::error;

use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) instance: String,
}

#[derive(Serialize)]
pub(crate) struct FullHealthResponse {
    pub(crate) status: &'static str,
    pub(crate) instance: String,
    pub(crate) build: String,
    pub(crate) degraded: Vec<String>,
    pub(crate) tools: ToolHealth,
    pub(crate) metrics: MetricsSnapshot,
}

#[derive(Serialize)]
pub(crate) struct ToolHealth {
    pub(crate) soffice: bool,
    pub(crate) pdftoppm: bool,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        instance: state.config.service.instance_name.clone(),
    })
}

pub(crate) async fn health_full(State(state): State<Arc<ApiState>>) -> Json<FullHealthResponse> {
    let convert = &state.config.convert;
    let soffice = ExternalTool::new("soffice", convert.soffice_path.clone(), convert.tool_timeout)
        .available("--version")
        .await;
    let pdftoppm = ExternalTool::new(
        "pdftoppm",
        convert.pdftoppm_path.clone(),
        convert.tool_timeout,
    )
    .available("-v")
    .await;

    let mut degraded = Vec::new();
    if !soffice {
        degraded.push("soffice".to_string());
    }
    if !pdftoppm {
        degraded.push("pdftoppm".to_string());
    }
    let status = if degraded.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(FullHealthResponse {
        status,
        instance: state.config.service.instance_name.clone(),
        build: build_sha().to_string(),
        degraded,
        tools: ToolHealth { soffice, pdftoppm },
        metrics: state.telemetry.snapshot(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
