//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges relevant to batch processing.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    encode_steps_total: IntCounterVec,
    batches_submitted_total: IntCounter,
    items_in_flight: IntGauge,
    items_failed_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total batches accepted since start-up.
    pub batches_submitted_total: u64,
    /// Items currently admitted across all batches.
    pub items_in_flight: i64,
    /// Total items that reached the errored state.
    pub items_failed_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let events_emitted_total = counter_vec(
            "events_emitted_total",
            "Domain events emitted by type",
            &["type"],
        )?;
        let encode_steps_total = counter_vec(
            "encode_steps_total",
            "Post-processing steps executed by status",
            &["step", "status"],
        )?;
        let batches_submitted_total = counter("batches_submitted_total", "Batches accepted")?;
        let items_in_flight = IntGauge::with_opts(Opts::new(
            "items_in_flight",
            "Items currently admitted across all batches",
        ))
        .map_err(|source| TelemetryError::Collector {
            metric: "items_in_flight",
            source,
        })?;
        let items_failed_total =
            counter("items_failed_total", "Items that reached the errored state")?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "events_emitted_total", &events_emitted_total)?;
        register(&registry, "encode_steps_total", &encode_steps_total)?;
        register(&registry, "batches_submitted_total", &batches_submitted_total)?;
        register(&registry, "items_in_flight", &items_in_flight)?;
        register(&registry, "items_failed_total", &items_failed_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                encode_steps_total,
                batches_submitted_total,
                items_in_flight,
                items_failed_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Increment the post-processing step counter.
    pub fn inc_encode_step(&self, step: &str, status: &str) {
        self.inner
            .encode_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Count an accepted batch.
    pub fn inc_batch_submitted(&self) {
        self.inner.batches_submitted_total.inc();
    }

    /// Record an item entering the in-flight set.
    pub fn inc_items_in_flight(&self) {
        self.inner.items_in_flight.inc();
    }

    /// Record an item leaving the in-flight set.
    pub fn dec_items_in_flight(&self) {
        self.inner.items_in_flight.dec();
    }

    /// Count an item that reached the errored state.
    pub fn inc_item_failed(&self) {
        self.inner.items_failed_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the batch gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_submitted_total: self.inner.batches_submitted_total.get(),
            items_in_flight: self.inner.items_in_flight.get(),
            items_failed_total: self.inner.items_failed_total.get(),
        }
    }
}

fn counter(metric: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(metric, help))
        .map_err(|source| TelemetryError::Collector { metric, source })
}

fn counter_vec(metric: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(metric, help), labels)
        .map_err(|source| TelemetryError::Collector { metric, source })
}

fn register<C>(registry: &Registry, metric: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Register { metric, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/songs", 200);
        metrics.inc_event("batch_submitted");
        metrics.inc_encode_step("transcode", "completed");
        metrics.inc_batch_submitted();
        metrics.inc_items_in_flight();
        metrics.inc_items_in_flight();
        metrics.dec_items_in_flight();
        metrics.inc_item_failed();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                batches_submitted_total: 1,
                items_in_flight: 1,
                items_failed_total: 1,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("encode_steps_total"));
        assert!(rendered.contains("items_in_flight 1"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_batch_submitted();
        assert_eq!(second.snapshot().batches_submitted_total, 0);
        Ok(())
    }
}
