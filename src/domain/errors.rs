use crate::models::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid quantity: {0} (must be at least 1)")]
    InvalidQuantity(i32),

    #[error("Product id must not be empty")]
    MissingProduct,

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}
