//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::{get, post},
};
use docmill_config::ConfigSnapshot;
use docmill_telemetry::{Metrics, build_sha, propagate_request_id_layer, set_request_id_layer};
use docmill_workspace::WorkspaceManager;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::http::constants::{HEADER_CSRF, HEADER_REQUEST_ID};
use crate::http::convert::{
    convert_images_to_pdf, convert_pdf_extract, convert_pdf_merge, convert_pdf_to_docx,
    convert_pdf_to_images,
};
use crate::http::csrf::issue_csrf;
use crate::http::health::{health, health_full, metrics};
use crate::http::rate_limit::require_within_rate_limit;
use crate::http::telemetry::HttpMetricsLayer;
use crate::state::ApiState;

/// Axum router wrapper that hosts the Docmill conversion service.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server with shared dependencies wired through
    /// application state.
    #[must_use]
    pub fn new(
        config: Arc<ConfigSnapshot>,
        workspaces: WorkspaceManager,
        telemetry: Metrics,
    ) -> Self {
        let state = Arc::new(ApiState::new(
            Arc::clone(&config),
            telemetry.clone(),
            workspaces,
        ));

        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, HeaderName::from_static(HEADER_CSRF)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    let status = response.status().as_u16();
                    span.record("status_code", status);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry));

        let router = Self::public_routes()
            .merge(Self::convert_routes(&state, &config))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/health/full", get(health_full))
            .route("/metrics", get(metrics))
            .route("/v1/csrf", get(issue_csrf))
    }

    fn convert_routes(state: &Arc<ApiState>, config: &ConfigSnapshot) -> Router<Arc<ApiState>> {
        let require_rate_limit =
            middleware::from_fn_with_state(Arc::clone(state), require_within_rate_limit);

        Router::new()
            .route("/v1/convert/pdf-to-docx", post(convert_pdf_to_docx))
            .route("/v1/convert/pdf-to-images", post(convert_pdf_to_images))
            .route("/v1/convert/pdf-merge", post(convert_pdf_merge))
            .route("/v1/convert/pdf-extract", post(convert_pdf_extract))
            .route("/v1/convert/images-to-pdf", post(convert_images_to_pdf))
            .route_layer(require_rate_limit)
            .layer(DefaultBodyLimit::max(request_body_limit(config)))
    }

    /// Bind the listener and serve until the task is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the server loop
    /// fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        tracing::info!("Starting API on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) const fn router(&self) -> &Router {
        &self.router
    }
}

/// Whole-request ceiling for the multipart body: every file at the per-file
/// cap, plus slack for field boundaries and headers.
fn request_body_limit(config: &ConfigSnapshot) -> usize {
    let files = u64::try_from(config.uploads.max_files_per_request).unwrap_or(u64::MAX);
    let total = config
        .uploads
        .max_upload_bytes
        .saturating_mul(files)
        .saturating_add(1024 * 1024);
    usize::try_from(total).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use docmill_config::load_with_lookup;
    use docmill_test_support::{pdf_with_pages, png_rgb, tool_available};
    use tower::ServiceExt;

    const BOUNDARY: &str = "docmill-router-tests";

    fn server(vars: &[(&str, &str)], workspace_root: &Path) -> ApiServer {
        let owned: Vec<(String, String)> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        let config = load_with_lookup(|key| {
            owned
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        })
        .expect("config loads");
        let telemetry = Metrics::new().expect("metrics");
        let workspaces = WorkspaceManager::new(workspace_root.to_path_buf(), telemetry.clone());
        ApiServer::new(Arc::new(config), workspaces, telemetry)
    }

    struct MultipartBody {
        bytes: Vec<u8>,
    }

    impl MultipartBody {
        fn new() -> Self {
            Self { bytes: Vec::new() }
        }

        fn text(mut self, name: &str, value: &str) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
            self
        }

        fn file(mut self, file_name: &str, content_type: &str, contents: &[u8]) -> Self {
            self.bytes.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            self.bytes.extend_from_slice(contents);
            self.bytes.extend_from_slice(b"\r\n");
            self
        }

        fn finish(mut self) -> Vec<u8> {
            self.bytes
                .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
            self.bytes
        }
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .expect("request builds")
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    async fn call(
        server: &ApiServer,
        request: axum::http::Request<Body>,
    ) -> axum::response::Response {
        server
            .router()
            .clone()
            .oneshot(request)
            .await
            .expect("router call succeeds")
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable")
            .to_vec()
    }

    fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn health_reports_instance_name() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[("DOCMILL_INSTANCE_NAME", "docmill-test")], root.path());

        let response = call(&server, get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["instance"], "docmill-test");
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_counters() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let response = call(&server, get_request("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(body_bytes(response).await).expect("utf-8 exposition");
        assert!(body.contains("rate_limit_throttled_total"));
        assert!(body.contains("active_workspaces"));
    }

    #[tokio::test]
    async fn csrf_endpoint_mints_tokens() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let response = call(&server, get_request("/v1/csrf")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert!(!json["token"].as_str().expect("token string").is_empty());
        assert!(json["expires_in_secs"].as_u64().expect("ttl") > 0);
    }

    #[tokio::test]
    async fn merge_combines_uploaded_documents() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(2))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(3))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, "content-type"),
            Some("application/pdf")
        );
        assert_eq!(
            header_str(&response, "content-disposition"),
            Some("attachment; filename=\"report-merged.pdf\"")
        );

        let merged = body_bytes(response).await;
        let document = lopdf::Document::load_mem(&merged).expect("merged pdf parses");
        assert_eq!(document.get_pages().len(), 5);
    }

    #[tokio::test]
    async fn extract_returns_the_requested_pages() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("book.pdf", "application/pdf", &pdf_with_pages(6))
            .text("pages", "2-4")
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-extract", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, "content-disposition"),
            Some("attachment; filename=\"book-pages-2-4.pdf\"")
        );

        let extracted = body_bytes(response).await;
        let document = lopdf::Document::load_mem(&extracted).expect("extracted pdf parses");
        assert_eq!(document.get_pages().len(), 3);
    }

    #[tokio::test]
    async fn images_become_a_multi_page_document() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("scan-1.png", "image/png", &png_rgb(40, 60))
            .file("scan-2.png", "image/png", &png_rgb(60, 40))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/images-to-pdf", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, "content-type"),
            Some("application/pdf")
        );

        let assembled = body_bytes(response).await;
        let document = lopdf::Document::load_mem(&assembled).expect("assembled pdf parses");
        assert_eq!(document.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn pdf_to_images_bundles_pages_into_a_zip() {
        if !tool_available("pdftoppm", "-v") {
            return;
        }
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("slides.pdf", "application/pdf", &pdf_with_pages(2))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-to-images", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            header_str(&response, "content-type"),
            Some("application/zip")
        );
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected_with_415() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("notes.txt", "text/plain", b"plain text")
            .file("more.txt", "text/plain", b"more text")
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let body = body_bytes(response).await;
        let json: serde_json::Value = serde_json::from_slice(&body).expect("problem json");
        assert_eq!(json["status"], 415);
        assert!(json["type"].as_str().expect("type uri").contains("problems"));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_with_413() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[("DOCMILL_MAX_UPLOAD_BYTES", "64")], root.path());

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(1))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_before_the_body_is_read() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[("DOCMILL_MAX_UPLOAD_BYTES", "64")], root.path());

        // Junk bytes: had this reached content validation the sniffer would
        // answer 415, so a 413 proves the declared length was checked first.
        let junk = [0_u8; 64 * 1024];
        let body = MultipartBody::new()
            .file("big.pdf", "application/pdf", &junk)
            .text("pages", "1")
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-extract", body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn csrf_enforcement_requires_a_minted_token() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[("DOCMILL_CSRF_ENFORCE", "true")], root.path());

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(1))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let minted = call(&server, get_request("/v1/csrf")).await;
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes(minted).await).expect("token json");
        let token = json["token"].as_str().expect("token string").to_string();

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(1))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let mut request = multipart_request("/v1/convert/pdf-merge", body);
        request.headers_mut().insert(
            HeaderName::from_static(HEADER_CSRF),
            token.parse().expect("token header"),
        );
        let response = call(&server, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_throttles_after_the_burst() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(
            &[
                ("DOCMILL_RATE_LIMIT_ENABLED", "true"),
                ("DOCMILL_RATE_BURST", "1"),
                ("DOCMILL_RATE_PERIOD_SECS", "3600"),
            ],
            root.path(),
        );

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(1))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("1"));

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(1))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(header_str(&response, "retry-after").is_some());
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));
    }

    #[tokio::test]
    async fn workspaces_are_cleaned_after_each_request() {
        let root = tempfile::tempdir().expect("tempdir");
        let server = server(&[], root.path());

        let body = MultipartBody::new()
            .file("report.pdf", "application/pdf", &pdf_with_pages(2))
            .file("appendix.pdf", "application/pdf", &pdf_with_pages(1))
            .finish();
        let response = call(&server, multipart_request("/v1/convert/pdf-merge", body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let leftovers = std::fs::read_dir(root.path())
            .expect("workspace root readable")
            .count();
        assert_eq!(leftovers, 0);
    }
}
