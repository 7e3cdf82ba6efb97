// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::messaging::PublishError;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order ingestion (accepted, rejected)
// - Event publication (throughput, latency, failures by reason)
// - Outbox sweep (pending backlog, terminal exhaustion)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub orders_created: IntCounter,
    pub orders_rejected: IntCounter,

    // Publication Metrics
    pub events_published: IntCounter,
    pub publish_failures: IntCounterVec,
    pub publish_duration: Histogram,

    // Outbox Metrics
    pub outbox_pending: IntGauge,
    pub outbox_exhausted: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Ingestion Metrics
        let orders_created = IntCounter::new(
            "orders_created_total",
            "Total orders accepted and durably written",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let orders_rejected = IntCounter::new(
            "orders_rejected_total",
            "Total order submissions rejected by validation",
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        // Publication Metrics
        let events_published = IntCounter::new(
            "order_events_published_total",
            "Total creation events accepted by the broker",
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new(
                "order_publish_failures_total",
                "Total publish attempts that failed",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let publish_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_event_publish_duration_seconds",
                "Broker publish round trip duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(publish_duration.clone()))?;

        // Outbox Metrics
        let outbox_pending = IntGauge::new(
            "outbox_pending_records",
            "Undelivered outbox records seen by the last sweep",
        )?;
        registry.register(Box::new(outbox_pending.clone()))?;

        let outbox_exhausted = IntCounter::new(
            "outbox_exhausted_total",
            "Outbox records marked terminally failed after exhausting retries",
        )?;
        registry.register(Box::new(outbox_exhausted.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            orders_rejected,
            events_published,
            publish_failures,
            publish_duration,
            outbox_pending,
            outbox_exhausted,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_rejected(&self) {
        self.orders_rejected.inc();
    }

    pub fn record_publish_success(&self, duration_secs: f64) {
        self.events_published.inc();
        self.publish_duration.observe(duration_secs);
    }

    pub fn record_publish_failure(&self, error: &PublishError) {
        let reason = match error {
            PublishError::NotReady => "not_ready",
            PublishError::Timeout(_) => "timeout",
            PublishError::BrokerDown => "breaker_open",
            PublishError::Broker(_) => "broker",
        };
        self.publish_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_exhausted(&self) {
        self.outbox_exhausted.inc();
    }

    pub fn set_pending(&self, count: i64) {
        self.outbox_pending.set(count);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_ingestion() {
        let metrics = Metrics::new().unwrap();
        metrics.record_created();
        metrics.record_created();
        metrics.record_rejected();

        let gathered = metrics.registry.gather();
        let created = gathered
            .iter()
            .find(|m| m.name() == "orders_created_total")
            .unwrap();
        assert_eq!(created.metric[0].counter.value, Some(2.0));

        let rejected = gathered
            .iter()
            .find(|m| m.name() == "orders_rejected_total")
            .unwrap();
        assert_eq!(rejected.metric[0].counter.value, Some(1.0));
    }

    #[test]
    fn test_record_publish_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish_success(0.02);
        metrics.record_publish_failure(&PublishError::Timeout(Duration::from_secs(5)));
        metrics.record_publish_failure(&PublishError::Broker("boom".to_string()));

        let gathered = metrics.registry.gather();
        let published = gathered
            .iter()
            .find(|m| m.name() == "order_events_published_total")
            .unwrap();
        assert_eq!(published.metric[0].counter.value, Some(1.0));

        let failures = gathered
            .iter()
            .find(|m| m.name() == "order_publish_failures_total")
            .unwrap();
        assert_eq!(failures.metric.len(), 2); // Two different reason labels
    }

    #[test]
    fn test_outbox_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.set_pending(7);
        metrics.record_exhausted();

        let gathered = metrics.registry.gather();
        let pending = gathered
            .iter()
            .find(|m| m.name() == "outbox_pending_records")
            .unwrap();
        assert_eq!(pending.metric[0].gauge.value, Some(7.0));

        let exhausted = gathered
            .iter()
            .find(|m| m.name() == "outbox_exhausted_total")
            .unwrap();
        assert_eq!(exhausted.metric[0].counter.value, Some(1.0));
    }
}
