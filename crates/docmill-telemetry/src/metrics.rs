//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges relevant to the conversion pipeline.

use std::convert::TryFrom;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    conversions_total: IntCounterVec,
    uploads_rejected_total: IntCounterVec,
    rate_limit_throttled_total: IntCounter,
    workspaces_swept_total: IntCounter,
    active_workspaces: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Number of request workspaces currently on disk.
    pub active_workspaces: i64,
    /// Total requests throttled by the IP rate limiter.
    pub rate_limit_throttled_total: u64,
    /// Total orphaned workspaces removed by the sweeper.
    pub workspaces_swept_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )?;
        let conversions_total = IntCounterVec::new(
            Opts::new(
                "conversions_total",
                "Conversion jobs executed by operation and status",
            ),
            &["operation", "status"],
        )?;
        let uploads_rejected_total = IntCounterVec::new(
            Opts::new(
                "uploads_rejected_total",
                "Uploads rejected during validation by reason",
            ),
            &["reason"],
        )?;
        let rate_limit_throttled_total = IntCounter::with_opts(Opts::new(
            "rate_limit_throttled_total",
            "Requests rejected due to IP rate limiting",
        ))?;
        let workspaces_swept_total = IntCounter::with_opts(Opts::new(
            "workspaces_swept_total",
            "Orphaned request workspaces removed by the sweeper",
        ))?;
        let active_workspaces = IntGauge::with_opts(Opts::new(
            "active_workspaces",
            "Request workspaces currently on disk",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(conversions_total.clone()))?;
        registry.register(Box::new(uploads_rejected_total.clone()))?;
        registry.register(Box::new(rate_limit_throttled_total.clone()))?;
        registry.register(Box::new(workspaces_swept_total.clone()))?;
        registry.register(Box::new(active_workspaces.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                http_requests_total,
                conversions_total,
                uploads_rejected_total,
                rate_limit_throttled_total,
                workspaces_swept_total,
                active_workspaces,
            }),
        })
    }

    /// Record an HTTP request outcome for the given route.
    pub fn observe_http_request(&self, route: &str, code: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &code.to_string()])
            .inc();
    }

    /// Record a conversion outcome for the given operation.
    pub fn observe_conversion(&self, operation: &str, status: &str) {
        self.inner
            .conversions_total
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Record a rejected upload with the validation reason.
    pub fn observe_upload_rejected(&self, reason: &str) {
        self.inner
            .uploads_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a request throttled by the rate limiter.
    pub fn inc_rate_limit_throttled(&self) {
        self.inner.rate_limit_throttled_total.inc();
    }

    /// Record orphaned workspaces removed by the sweeper.
    pub fn add_workspaces_swept(&self, count: u64) {
        self.inner.workspaces_swept_total.inc_by(count);
    }

    /// Track the number of workspaces currently on disk.
    pub fn set_active_workspaces(&self, count: i64) {
        self.inner.active_workspaces.set(count);
    }

    /// Increment the active workspace gauge.
    pub fn inc_active_workspaces(&self) {
        self.inner.active_workspaces.inc();
    }

    /// Decrement the active workspace gauge.
    pub fn dec_active_workspaces(&self) {
        self.inner.active_workspaces.dec();
    }

    /// Produce a serialisable snapshot for health reporting.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_workspaces: self.inner.active_workspaces.get(),
            rate_limit_throttled_total: self.inner.rate_limit_throttled_total.get(),
            workspaces_swept_total: self.inner.workspaces_swept_total.get(),
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding the metric families fails or the output is
    /// not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Convert a usize count into the gauge's signed domain, saturating.
    #[must_use]
    pub fn gauge_value(count: usize) -> i64 {
        i64::try_from(count).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_render() {
        let metrics = Metrics::new().expect("metrics");
        metrics.observe_http_request("/v1/convert/pdf-to-docx", 200);
        metrics.observe_conversion("pdf_to_docx", "completed");
        metrics.observe_upload_rejected("too_large");
        metrics.inc_rate_limit_throttled();
        metrics.add_workspaces_swept(2);
        metrics.set_active_workspaces(3);

        let rendered = metrics.render().expect("render");
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("conversions_total"));
        assert!(rendered.contains("uploads_rejected_total"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_workspaces, 3);
        assert_eq!(snapshot.rate_limit_throttled_total, 1);
        assert_eq!(snapshot.workspaces_swept_total, 2);
    }

    #[test]
    fn gauge_value_saturates() {
        assert_eq!(Metrics::gauge_value(5), 5);
        assert_eq!(Metrics::gauge_value(usize::MAX), i64::MAX);
    }
}
