use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::sleep;

use crate::messaging::{EventPublisher, PublishError};
use crate::metrics::Metrics;
use crate::models::{DeliveryState, OutboxRecord, ORDER_CREATED_TOPIC};
use crate::store::{OrderStore, StoreError};
use crate::utils::BackoffPolicy;

// ============================================================================
// Outbox Sweeper - re-attempts undelivered creation events
// ============================================================================
//
// Runs as an independent task on a poll interval. Each pass scans for
// Unsent/Failed records, skips those whose backoff delay has not elapsed,
// and re-publishes the rest. Records that exhaust the attempt bound are
// marked terminally Failed and counted, never retried again.
//
// Delivery is at-least-once: a crash between publish and the Sent marker
// means the next pass publishes a duplicate, which downstream consumers
// dedup by order id.
//
// ============================================================================

#[derive(Clone)]
pub struct SweepConfig {
    /// Time between sweep passes
    pub poll_interval: Duration,
    /// Attempt bound after which a record is terminally Failed
    pub max_attempts: i32,
    /// Per-record delay schedule, keyed by attempts so far
    pub backoff: BackoffPolicy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_attempts: 10,
            backoff: BackoffPolicy {
                max_attempts: 10,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
            },
        }
    }
}

/// Tally of one sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub published: usize,
    pub deferred: usize,
    pub failed: usize,
    pub exhausted: usize,
}

pub struct OutboxSweeper {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
    config: SweepConfig,
}

impl OutboxSweeper {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
            config,
        }
    }

    /// Spawn the periodic sweep loop.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis(),
            max_attempts = self.config.max_attempts,
            "🔄 Outbox sweeper started"
        );

        tokio::spawn(async move {
            loop {
                match self.sweep_once().await {
                    Ok(outcome) => {
                        if outcome != SweepOutcome::default() {
                            tracing::info!(
                                published = outcome.published,
                                deferred = outcome.deferred,
                                failed = outcome.failed,
                                exhausted = outcome.exhausted,
                                "Sweep pass complete"
                            );
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "Sweep pass failed");
                    }
                }

                sleep(self.config.poll_interval).await;
            }
        })
    }

    /// One sweep pass over every undelivered record.
    pub async fn sweep_once(&self) -> Result<SweepOutcome, StoreError> {
        let due = self.store.sweep_due(self.config.max_attempts).await?;
        self.metrics.set_pending(due.len() as i64);

        let mut outcome = SweepOutcome::default();
        let now = Utc::now();

        for record in due {
            let wait = self.config.backoff.delay_for(record.attempts as u32);
            let elapsed = now.signed_duration_since(record.updated_at);
            if elapsed < chrono::Duration::milliseconds(wait.as_millis() as i64) {
                outcome.deferred += 1;
                continue;
            }

            self.attempt(&record, &mut outcome).await?;
        }

        Ok(outcome)
    }

    async fn attempt(
        &self,
        record: &OutboxRecord,
        outcome: &mut SweepOutcome,
    ) -> Result<(), StoreError> {
        let key = record.order_id.to_string();
        let started = Instant::now();

        match self
            .publisher
            .publish(ORDER_CREATED_TOPIC, &key, &record.event_payload)
            .await
        {
            Ok(()) => {
                self.metrics
                    .record_publish_success(started.elapsed().as_secs_f64());
                super::mark_delivery(
                    self.store.as_ref(),
                    record.order_id,
                    record.version,
                    record.attempts + 1,
                    DeliveryState::Sent,
                )
                .await?;
                outcome.published += 1;
            }
            Err(err @ (PublishError::NotReady | PublishError::BrokerDown)) => {
                // No broker round trip happened, so the attempt is free:
                // leave the record untouched for the next pass.
                self.metrics.record_publish_failure(&err);
                outcome.deferred += 1;
            }
            Err(err) => {
                self.metrics.record_publish_failure(&err);
                let attempts = record.attempts + 1;

                if attempts >= self.config.max_attempts {
                    self.metrics.record_exhausted();
                    tracing::error!(
                        order_id = %record.order_id,
                        attempts = attempts,
                        error = %err,
                        "Exhausted publish attempts, marking terminally failed"
                    );
                    outcome.exhausted += 1;
                } else {
                    tracing::warn!(
                        order_id = %record.order_id,
                        attempts = attempts,
                        error = %err,
                        "Publish attempt failed, will retry"
                    );
                    outcome.failed += 1;
                }

                super::mark_delivery(
                    self.store.as_ref(),
                    record.order_id,
                    record.version,
                    attempts,
                    DeliveryState::Failed,
                )
                .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::test_support::ScriptedPublisher;
    use crate::outbox::OutboxCoordinator;
    use crate::store::MemoryOrderStore;

    fn immediate_config(max_attempts: i32) -> SweepConfig {
        SweepConfig {
            poll_interval: Duration::from_millis(10),
            max_attempts,
            backoff: BackoffPolicy {
                max_attempts: max_attempts as u32,
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                multiplier: 1.0,
            },
        }
    }

    fn sweeper_with(
        store: Arc<MemoryOrderStore>,
        publisher: Arc<ScriptedPublisher>,
        metrics: Arc<Metrics>,
        config: SweepConfig,
    ) -> OutboxSweeper {
        OutboxSweeper::new(store, publisher, metrics, config)
    }

    #[tokio::test]
    async fn sweep_recovers_failed_first_publish() {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(ScriptedPublisher::failing(1));
        let metrics = Arc::new(Metrics::default());

        let coordinator =
            OutboxCoordinator::new(store.clone(), publisher.clone(), metrics.clone());
        let order = coordinator.submit("alice", "prod-1", 2).await.unwrap();

        // First publish failed in-line
        let record = store.get_outbox(order.id).await.unwrap();
        assert_eq!(record.delivery_state, DeliveryState::Failed);
        assert_eq!(record.attempts, 1);

        // Order stayed visible and intact the whole time
        assert_eq!(store.get(order.id).await.unwrap(), order);

        let sweeper = sweeper_with(
            store.clone(),
            publisher.clone(),
            metrics,
            immediate_config(10),
        );
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome.published, 1);

        let record = store.get_outbox(order.id).await.unwrap();
        assert_eq!(record.delivery_state, DeliveryState::Sent);
        assert_eq!(record.attempts, 2);
        assert_eq!(publisher.delivered().await.len(), 1);

        // A second pass finds nothing to do: Sent is marked exactly once
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome.published, 0);
        assert_eq!(publisher.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn records_inside_backoff_window_are_deferred() {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(ScriptedPublisher::failing(1));
        let metrics = Arc::new(Metrics::default());

        let coordinator =
            OutboxCoordinator::new(store.clone(), publisher.clone(), metrics.clone());
        coordinator.submit("alice", "prod-1", 2).await.unwrap();

        // The record was touched just now, well inside the backoff window
        let config = SweepConfig {
            backoff: BackoffPolicy {
                max_attempts: 10,
                initial_delay: Duration::from_secs(60),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
            },
            ..SweepConfig::default()
        };
        let sweeper = sweeper_with(store.clone(), publisher.clone(), metrics, config);
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome.deferred, 1);
        assert_eq!(outcome.published, 0);
        assert_eq!(publisher.delivered().await.len(), 0);
    }

    #[tokio::test]
    async fn exhausted_records_become_terminal() {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(ScriptedPublisher::failing(100));
        let metrics = Arc::new(Metrics::default());

        let coordinator =
            OutboxCoordinator::new(store.clone(), publisher.clone(), metrics.clone());
        let order = coordinator.submit("alice", "prod-1", 2).await.unwrap();

        // attempts is 1 after the failed first publish; bound of 2 means
        // the next failure is terminal
        let sweeper = sweeper_with(
            store.clone(),
            publisher.clone(),
            metrics.clone(),
            immediate_config(2),
        );
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome.exhausted, 1);
        assert_eq!(metrics.outbox_exhausted.get(), 1);

        let record = store.get_outbox(order.id).await.unwrap();
        assert_eq!(record.delivery_state, DeliveryState::Failed);
        assert_eq!(record.attempts, 2);

        // Subsequent sweeps never pick it up again
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(publisher.delivered().await.len(), 0);
    }

    #[tokio::test]
    async fn not_ready_publisher_defers_without_burning_attempts() {
        struct NeverReady;

        #[async_trait::async_trait]
        impl EventPublisher for NeverReady {
            async fn publish(&self, _: &str, _: &str, _: &str) -> Result<(), PublishError> {
                Err(PublishError::NotReady)
            }
        }

        let store = Arc::new(MemoryOrderStore::new());
        let metrics = Arc::new(Metrics::default());

        let coordinator = OutboxCoordinator::new(
            store.clone(),
            Arc::new(NeverReady),
            metrics.clone(),
        );
        let order = coordinator.submit("alice", "prod-1", 2).await.unwrap();
        let before = store.get_outbox(order.id).await.unwrap();

        let sweeper = OutboxSweeper::new(
            store.clone(),
            Arc::new(NeverReady),
            metrics,
            immediate_config(10),
        );
        let outcome = sweeper.sweep_once().await.unwrap();
        assert_eq!(outcome.deferred, 1);

        let after = store.get_outbox(order.id).await.unwrap();
        assert_eq!(after.attempts, before.attempts);
    }

    #[tokio::test]
    async fn end_to_end_submit_list_and_sweep() {
        let store = Arc::new(MemoryOrderStore::new());
        let publisher = Arc::new(ScriptedPublisher::failing(1));
        let metrics = Arc::new(Metrics::default());

        let coordinator =
            OutboxCoordinator::new(store.clone(), publisher.clone(), metrics.clone());
        let order = coordinator.submit("dave", "prod-2", 3).await.unwrap();

        let listed = store.list_by_owner("dave").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, order.id);

        let sweeper = sweeper_with(
            store.clone(),
            publisher.clone(),
            metrics,
            immediate_config(10),
        );
        sweeper.sweep_once().await.unwrap();

        let record = store.get_outbox(order.id).await.unwrap();
        assert_eq!(record.delivery_state, DeliveryState::Sent);

        let delivered = publisher.delivered().await;
        assert_eq!(delivered.len(), 1);
        let event: serde_json::Value = serde_json::from_str(&delivered[0].2).unwrap();
        assert_eq!(event["id"], serde_json::json!(order.id.to_string()));
        assert_eq!(event["ownerId"], serde_json::json!("dave"));
    }
}
