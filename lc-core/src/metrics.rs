//! Prometheus metrics for the LC transaction pipeline
//!
//! Tracks submissions, confirmations, retries and confirmation latency.

use crate::Result;
use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Pipeline metrics on a private registry
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Registry rendered by [`Metrics::export`]
    pub registry: Registry,

    /// Operations accepted by the ledger
    pub operations_submitted: IntCounter,
    /// Operations with a successful final receipt
    pub operations_confirmed: IntCounter,
    /// Operations ending in a terminal failure
    pub operations_failed: IntCounter,
    /// Sequence collisions seen on submit
    pub sequence_collisions: IntCounter,
    /// Underpriced retries
    pub fee_bumps: IntCounter,
    /// Confirmation waits that hit their bound
    pub confirmation_timeouts: IntCounter,
    /// Submit-to-receipt latency
    pub confirmation_latency_seconds: Histogram,
}

impl Metrics {
    /// Register all pipeline metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations_submitted = register_int_counter_with_registry!(
            Opts::new("lc_operations_submitted_total", "Operations accepted by the ledger"),
            registry
        )?;

        let operations_confirmed = register_int_counter_with_registry!(
            Opts::new("lc_operations_confirmed_total", "Operations confirmed successfully"),
            registry
        )?;

        let operations_failed = register_int_counter_with_registry!(
            Opts::new("lc_operations_failed_total", "Operations that failed terminally"),
            registry
        )?;

        let sequence_collisions = register_int_counter_with_registry!(
            Opts::new("lc_sequence_collisions_total", "Sequence number collisions on submit"),
            registry
        )?;

        let fee_bumps = register_int_counter_with_registry!(
            Opts::new("lc_fee_bumps_total", "Resubmissions with an increased fee rate"),
            registry
        )?;

        let confirmation_timeouts = register_int_counter_with_registry!(
            Opts::new("lc_confirmation_timeouts_total", "Confirmation waits that timed out"),
            registry
        )?;

        let confirmation_latency_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "lc_confirmation_latency_seconds",
                "Time from submission to final receipt"
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            registry
        )?;

        Ok(Self {
            registry,
            operations_submitted,
            operations_confirmed,
            operations_failed,
            sequence_collisions,
            fee_bumps,
            confirmation_timeouts,
            confirmation_latency_seconds,
        })
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
