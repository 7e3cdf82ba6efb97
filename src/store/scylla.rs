use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use uuid::Uuid;

use crate::models::{DeliveryState, Order, OrderStatus, OutboxRecord};

use super::{OrderStore, StoreError};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// Orders and outbox records live in two tables keyed by order id. The pair
// write uses a logged batch so either both rows land or neither does.
// Outbox updates go through a lightweight transaction on the version column,
// which is what turns concurrent markers into Conflict instead of lost
// updates.
//
// ============================================================================

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    /// Create the store, ensuring both tables exist.
    pub async fn init(session: Arc<Session>) -> anyhow::Result<Self> {
        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    id uuid PRIMARY KEY,
                    owner_id text,
                    product_id text,
                    quantity int,
                    status text,
                    created_at timestamp,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;

        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS outbox_records (
                    order_id uuid PRIMARY KEY,
                    event_payload text,
                    delivery_state text,
                    attempts int,
                    version bigint,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;

        tracing::info!("Order and outbox tables ready");
        Ok(Self { session })
    }
}

type OrderRow = (Uuid, String, String, i32, String, DateTime<Utc>, DateTime<Utc>);
type OutboxRow = (Uuid, String, String, i32, i64, DateTime<Utc>);

fn order_from_row(row: OrderRow) -> Result<Order, StoreError> {
    let (id, owner_id, product_id, quantity, status, created_at, updated_at) = row;
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| StoreError::Backend(anyhow!("Unknown order status: {status}")))?;
    Ok(Order {
        id,
        owner_id,
        product_id,
        quantity,
        status,
        created_at,
        updated_at,
    })
}

fn outbox_from_row(row: OutboxRow) -> Result<OutboxRecord, StoreError> {
    let (order_id, event_payload, delivery_state, attempts, version, updated_at) = row;
    let delivery_state = DeliveryState::parse(&delivery_state).ok_or_else(|| {
        StoreError::Backend(anyhow!("Unknown delivery state: {delivery_state}"))
    })?;
    Ok(OutboxRecord {
        order_id,
        event_payload,
        delivery_state,
        attempts,
        version,
        updated_at,
    })
}

fn backend(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Backend(anyhow::Error::new(err))
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn put(&self, order: &Order, outbox: &OutboxRecord) -> Result<(), StoreError> {
        let mut batch = Batch::default();
        batch.append_statement(
            "INSERT INTO orders (id, owner_id, product_id, quantity, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO outbox_records (order_id, event_payload, delivery_state, attempts, version, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        );

        tracing::debug!(order_id = %order.id, "Persisting order with outbox record");

        self.session
            .batch(
                &batch,
                (
                    (
                        order.id,
                        order.owner_id.as_str(),
                        order.product_id.as_str(),
                        order.quantity,
                        order.status.as_str(),
                        order.created_at,
                        order.updated_at,
                    ),
                    (
                        outbox.order_id,
                        outbox.event_payload.as_str(),
                        outbox.delivery_state.as_str(),
                        outbox.attempts,
                        outbox.version,
                        outbox.updated_at,
                    ),
                ),
            )
            .await
            .map_err(backend)?;

        tracing::info!(order_id = %order.id, "✅ Transactionally persisted order and outbox record");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, owner_id, product_id, quantity, status, created_at, updated_at \
                 FROM orders WHERE id = ?",
                (id,),
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let rows = rows_result.rows::<OrderRow>().map_err(backend)?;
        if let Some(row) = rows.into_iter().next() {
            return order_from_row(row.map_err(backend)?);
        }
        Err(StoreError::NotFound(id))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Order>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT id, owner_id, product_id, quantity, status, created_at, updated_at \
                 FROM orders WHERE owner_id = ? ALLOW FILTERING",
                (owner_id,),
            )
            .await
            .map_err(backend)?;

        let mut orders = Vec::new();
        let rows_result = result.into_rows_result().map_err(backend)?;
        let rows = rows_result.rows::<OrderRow>().map_err(backend)?;
        for row in rows {
            orders.push(order_from_row(row.map_err(backend)?)?);
        }

        // Scylla returns partition order; callers expect oldest first
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn get_outbox(&self, order_id: Uuid) -> Result<OutboxRecord, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT order_id, event_payload, delivery_state, attempts, version, updated_at \
                 FROM outbox_records WHERE order_id = ?",
                (order_id,),
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let rows = rows_result.rows::<OutboxRow>().map_err(backend)?;
        if let Some(row) = rows.into_iter().next() {
            return outbox_from_row(row.map_err(backend)?);
        }
        Err(StoreError::NotFound(order_id))
    }

    async fn update_outbox_state(
        &self,
        order_id: Uuid,
        expected_version: i64,
        state: DeliveryState,
        attempts: i32,
    ) -> Result<(), StoreError> {
        let result = self
            .session
            .query_unpaged(
                "UPDATE outbox_records \
                 SET delivery_state = ?, attempts = ?, version = ?, updated_at = ? \
                 WHERE order_id = ? IF version = ?",
                (
                    state.as_str(),
                    attempts,
                    expected_version + 1,
                    Utc::now(),
                    order_id,
                    expected_version,
                ),
            )
            .await
            .map_err(backend)?;

        // The conditional result row leads with the [applied] boolean
        let rows_result = result.into_rows_result().map_err(backend)?;
        let rows = rows_result.rows::<Row>().map_err(backend)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(anyhow!("Conditional update returned no result row")))?
            .map_err(backend)?;

        let applied = matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))));
        if applied {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                order_id,
                expected: expected_version,
            })
        }
    }

    async fn sweep_due(&self, max_attempts: i32) -> Result<Vec<OutboxRecord>, StoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT order_id, event_payload, delivery_state, attempts, version, updated_at \
                 FROM outbox_records",
                &[],
            )
            .await
            .map_err(backend)?;

        let mut due = Vec::new();
        let rows_result = result.into_rows_result().map_err(backend)?;
        let rows = rows_result.rows::<OutboxRow>().map_err(backend)?;
        for row in rows {
            let record = outbox_from_row(row.map_err(backend)?)?;
            if record.delivery_state != DeliveryState::Sent && record.attempts < max_attempts {
                due.push(record);
            }
        }

        due.sort_by_key(|r| r.updated_at);
        Ok(due)
    }
}
