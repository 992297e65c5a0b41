//! Prometheus implementation of the latency observer.
//!
//! # Metrics
//!
//! - `shorty_operation_latency_seconds{operation, outcome}`: duration of
//!   every `resolve_by_code` and `resolve_or_create` call.

use prometheus::{Encoder, HistogramOpts, HistogramVec, Registry, TextEncoder};
use shorty_core::{LatencyObserver, Operation, Outcome};
use std::time::Duration;

/// Histogram buckets for operation latencies (in seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Metrics registered in a private registry, created once per process.
pub struct PrometheusMetrics {
    registry: Registry,
    latency: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "shorty_operation_latency_seconds",
                "Latency of shortener operations",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self { registry, latency })
    }

    /// Encodes all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl LatencyObserver for PrometheusMetrics {
    fn observe(&self, operation: Operation, outcome: Outcome, elapsed: Duration) {
        self.latency
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_samples_by_operation_and_outcome() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.observe(
            Operation::ResolveOrCreate,
            Outcome::Ok,
            Duration::from_millis(3),
        );
        metrics.observe(
            Operation::ResolveByCode,
            Outcome::NotFound,
            Duration::from_millis(1),
        );

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains(
            r#"shorty_operation_latency_seconds_count{operation="resolve_or_create",outcome="ok"} 1"#
        ));
        assert!(rendered.contains(
            r#"shorty_operation_latency_seconds_count{operation="resolve_by_code",outcome="not_found"} 1"#
        ));
    }

    #[test]
    fn registries_are_independent() {
        let first = PrometheusMetrics::new().unwrap();
        let second = PrometheusMetrics::new().unwrap();

        first.observe(Operation::ResolveByCode, Outcome::Ok, Duration::ZERO);

        assert!(!second.render().unwrap().contains("resolve_by_code"));
    }
}
