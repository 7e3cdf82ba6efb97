use chrono::Utc;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};

use super::errors::OrderError;

// ============================================================================
// Order Lifecycle - status state machine and creation rules
// ============================================================================
//
// Legal transitions:
//   Pending    -> Processing
//   Processing -> Completed
//   Pending    -> Cancelled
//   Processing -> Cancelled
//
// Completed and Cancelled are terminal. Everything else is rejected
// without mutating the order.
//
// ============================================================================

/// Validate inputs and build a new Pending order owned by `owner_id`.
pub fn create(owner_id: &str, product_id: &str, quantity: i32) -> Result<Order, OrderError> {
    if quantity < 1 {
        return Err(OrderError::InvalidQuantity(quantity));
    }
    if product_id.trim().is_empty() {
        return Err(OrderError::MissingProduct);
    }

    let now = Utc::now();
    Ok(Order {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    })
}

/// Whether `from -> to` is a legal status transition.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Processing)
            | (OrderStatus::Processing, OrderStatus::Completed)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::Processing, OrderStatus::Cancelled)
    )
}

/// Apply a status transition, returning the updated order.
///
/// The input order is untouched on rejection. Accepted transitions
/// refresh `updated_at`.
pub fn apply(order: &Order, to: OrderStatus) -> Result<Order, OrderError> {
    if !can_transition(order.status, to) {
        return Err(OrderError::IllegalTransition {
            from: order.status,
            to,
        });
    }

    let mut updated = order.clone();
    updated.status = to;
    updated.updated_at = Utc::now();
    Ok(updated)
}
