use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{DeliveryState, Order, OutboxRecord};
use crate::utils::IsTransient;

mod memory;
mod scylla;

pub use memory::MemoryOrderStore;
pub use scylla::ScyllaOrderStore;

// ============================================================================
// Order Store
// ============================================================================
//
// Durable home for orders and their outbox records. The pair write in `put`
// is one logical unit: either both rows land or neither does.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Stale outbox version for order {order_id} (expected {expected})")]
    Conflict { order_id: Uuid, expected: i64 },

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist an order and its outbox record as one logical unit.
    async fn put(&self, order: &Order, outbox: &OutboxRecord) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Order, StoreError>;

    /// All orders belonging to a principal, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StoreError>;

    async fn get_outbox(&self, order_id: Uuid) -> Result<OutboxRecord, StoreError>;

    /// Update delivery bookkeeping, guarded by the record's version.
    ///
    /// A successful update bumps the version by one and refreshes
    /// `updated_at`. A stale `expected_version` yields `Conflict` and
    /// changes nothing.
    async fn update_outbox_state(
        &self,
        order_id: Uuid,
        expected_version: i64,
        state: DeliveryState,
        attempts: i32,
    ) -> Result<(), StoreError>;

    /// Records still awaiting delivery: Unsent or Failed, below the
    /// attempt bound. Terminally exhausted records are excluded.
    async fn sweep_due(&self, max_attempts: i32) -> Result<Vec<OutboxRecord>, StoreError>;
}
