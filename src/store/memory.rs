use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{DeliveryState, Order, OutboxRecord};

use super::{OrderStore, StoreError};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Backs tests and local runs without a database. A single lock over both
// maps makes the pair write trivially atomic.
//
// ============================================================================

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    outbox: HashMap<Uuid, OutboxRecord>,
}

#[derive(Default)]
pub struct MemoryOrderStore {
    inner: RwLock<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn put(&self, order: &Order, outbox: &OutboxRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.orders.insert(order.id, order.clone());
        inner.outbox.insert(outbox.order_id, outbox.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        let inner = self.inner.read().await;
        inner
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.owner_id == owner_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn get_outbox(&self, order_id: Uuid) -> Result<OutboxRecord, StoreError> {
        let inner = self.inner.read().await;
        inner
            .outbox
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn update_outbox_state(
        &self,
        order_id: Uuid,
        expected_version: i64,
        state: DeliveryState,
        attempts: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .outbox
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound(order_id))?;

        if record.version != expected_version {
            return Err(StoreError::Conflict {
                order_id,
                expected: expected_version,
            });
        }

        record.delivery_state = state;
        record.attempts = attempts;
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn sweep_due(&self, max_attempts: i32) -> Result<Vec<OutboxRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut due: Vec<OutboxRecord> = inner
            .outbox
            .values()
            .filter(|r| r.delivery_state != DeliveryState::Sent && r.attempts < max_attempts)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.updated_at);
        Ok(due)
    }
}
