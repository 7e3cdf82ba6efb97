use uuid::Uuid;

use crate::models::DeliveryState;
use crate::store::{OrderStore, StoreError};

pub mod coordinator;
pub mod sweep;

pub use coordinator::{OutboxCoordinator, SubmitError};
pub use sweep::{OutboxSweeper, SweepConfig};

// ============================================================================
// Outbox - reliable event delivery bookkeeping
// ============================================================================

const MARK_RETRY_LIMIT: u32 = 3;

/// Mark a record's delivery outcome, resolving version conflicts.
///
/// On Conflict the record is re-read: if another writer already marked it
/// Sent the update is skipped (Ok(false)), which is what keeps a record
/// from being marked Sent twice. Otherwise the version is refreshed and
/// the update retried, bounded by MARK_RETRY_LIMIT.
pub(crate) async fn mark_delivery(
    store: &dyn OrderStore,
    order_id: Uuid,
    mut expected_version: i64,
    mut attempts: i32,
    state: DeliveryState,
) -> Result<bool, StoreError> {
    for _ in 0..MARK_RETRY_LIMIT {
        match store
            .update_outbox_state(order_id, expected_version, state, attempts)
            .await
        {
            Ok(()) => return Ok(true),
            Err(StoreError::Conflict { .. }) => {
                let current = store.get_outbox(order_id).await?;
                if current.delivery_state == DeliveryState::Sent {
                    tracing::debug!(
                        order_id = %order_id,
                        "Record already marked Sent by another writer, skipping"
                    );
                    return Ok(false);
                }
                expected_version = current.version;
                attempts = attempts.max(current.attempts);
            }
            Err(err) => return Err(err),
        }
    }

    tracing::warn!(
        order_id = %order_id,
        state = %state,
        "Gave up marking delivery state after repeated conflicts"
    );
    Ok(false)
}
