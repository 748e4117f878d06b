//! # Prometheus Metrics
//!
//! Operational metrics for a chain node, scraped by Prometheus at `/metrics`
//! on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `strand` prefix, so they do not collide with any default global
//! registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Metric handles are internally reference-counted, so clones share the
/// same underlying values.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Blocks successfully appended through this node.
    pub blocks_appended_total: IntCounter,
    /// Appends that failed in the store.
    pub append_failures_total: IntCounter,
    /// Height of the last sealed block, -1 when empty.
    pub chain_height: IntGauge,
    /// Block and chain validation requests served.
    pub validation_runs_total: IntCounter,
    /// Heights reported invalid across all validation runs.
    pub invalid_blocks_total: IntCounter,
    /// Time spent sealing and persisting one block.
    pub append_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("strand".into()), None)?;

        let blocks_appended_total = IntCounter::new(
            "blocks_appended_total",
            "Total number of blocks appended to the chain",
        )?;
        registry.register(Box::new(blocks_appended_total.clone()))?;

        let append_failures_total = IntCounter::new(
            "append_failures_total",
            "Total number of block appends that failed in the store",
        )?;
        registry.register(Box::new(append_failures_total.clone()))?;

        let chain_height = IntGauge::new("chain_height", "Height of the last sealed block")?;
        registry.register(Box::new(chain_height.clone()))?;

        let validation_runs_total = IntCounter::new(
            "validation_runs_total",
            "Total number of block and chain validation runs",
        )?;
        registry.register(Box::new(validation_runs_total.clone()))?;

        let invalid_blocks_total = IntCounter::new(
            "invalid_blocks_total",
            "Total number of heights reported invalid by validation runs",
        )?;
        registry.register(Box::new(invalid_blocks_total.clone()))?;

        let append_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "append_latency_seconds",
                "Time to seal and persist one block, in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(append_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            blocks_appended_total,
            append_failures_total,
            chain_height,
            validation_runs_total,
            invalid_blocks_total,
            append_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
