use std::sync::Arc;
use std::time::Instant;

use crate::domain::{lifecycle, OrderError};
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::models::{DeliveryState, Order, OutboxRecord, ORDER_CREATED_TOPIC};
use crate::store::{OrderStore, StoreError};
use crate::utils::{retry_transient, BackoffPolicy};

// ============================================================================
// Outbox Coordinator
// ============================================================================
//
// The write path: validate, persist order + outbox record as one unit,
// then attempt the first publish. The durable write is the commit point.
// A failed publish never fails the submission; the sweeper owns every
// retry after this.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to encode creation event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct OutboxCoordinator {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
    store_retry: BackoffPolicy,
}

impl OutboxCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
            store_retry: BackoffPolicy::default(),
        }
    }

    /// Accept an order on behalf of the authenticated `owner_id`.
    ///
    /// Returns the created order once it is durably written. Event
    /// delivery happens after the commit point and cannot fail the call.
    pub async fn submit(
        &self,
        owner_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> Result<Order, SubmitError> {
        let order = match lifecycle::create(owner_id, product_id, quantity) {
            Ok(order) => order,
            Err(err) => {
                self.metrics.record_rejected();
                return Err(err.into());
            }
        };
        let record = OutboxRecord::for_order(&order)?;

        retry_transient(&self.store_retry, || async {
            self.store.put(&order, &record).await
        })
        .await?;
        self.metrics.record_created();

        tracing::info!(
            order_id = %order.id,
            owner_id = %order.owner_id,
            "Order accepted and durably written"
        );

        self.first_publish(&order, &record).await;
        Ok(order)
    }

    /// Best-effort inline publish of the creation event.
    async fn first_publish(&self, order: &Order, record: &OutboxRecord) {
        let key = order.id.to_string();
        let started = Instant::now();

        let outcome = self
            .publisher
            .publish(ORDER_CREATED_TOPIC, &key, &record.event_payload)
            .await;

        let state = match outcome {
            Ok(()) => {
                self.metrics
                    .record_publish_success(started.elapsed().as_secs_f64());
                DeliveryState::Sent
            }
            Err(err) => {
                tracing::warn!(
                    order_id = %order.id,
                    error = %err,
                    "Initial publish failed, deferring to sweep"
                );
                self.metrics.record_publish_failure(&err);
                DeliveryState::Failed
            }
        };

        let marked = super::mark_delivery(
            self.store.as_ref(),
            order.id,
            record.version,
            record.attempts + 1,
            state,
        )
        .await;

        if let Err(err) = marked {
            // The sweep re-reads delivery state, so a lost marker only
            // costs a duplicate publish, never a lost event.
            tracing::error!(
                order_id = %order.id,
                error = %err,
                "Failed to record delivery outcome"
            );
        }
    }
}
