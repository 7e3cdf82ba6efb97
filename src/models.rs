use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Domain Models
// ============================================================================

/// Topic carrying order-creation announcements.
pub const ORDER_CREATED_TOPIC: &str = "order-created";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Authenticated principal that created the order. Never client-supplied.
    pub owner_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OrderStatus::Pending),
            "Processing" => Some(OrderStatus::Processing),
            "Completed" => Some(OrderStatus::Completed),
            "Cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outbox
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    Unsent,
    Sent,
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Unsent => "Unsent",
            DeliveryState::Sent => "Sent",
            DeliveryState::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unsent" => Some(DeliveryState::Unsent),
            "Sent" => Some(DeliveryState::Sent),
            "Failed" => Some(DeliveryState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending announcement paired with a durable order write.
///
/// The payload is the serialized creation-time snapshot, frozen at write
/// time so later order mutations never leak into the announcement.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutboxRecord {
    pub order_id: Uuid,
    pub event_payload: String,
    pub delivery_state: DeliveryState,
    pub attempts: i32,
    /// Optimistic concurrency token, bumped by the store on every update.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl OutboxRecord {
    pub fn for_order(order: &Order) -> Result<Self, serde_json::Error> {
        let event = OrderCreatedEvent::from(order);
        Ok(Self {
            order_id: order.id,
            event_payload: serde_json::to_string(&event)?,
            delivery_state: DeliveryState::Unsent,
            attempts: 0,
            version: 1,
            updated_at: order.created_at,
        })
    }
}

// ============================================================================
// Wire Events
// ============================================================================

/// Creation announcement as it appears on the wire, keyed by order id.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub id: Uuid,
    pub owner_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<&Order> for OrderCreatedEvent {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            owner_id: order.owner_id.clone(),
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            status: order.status,
            order_date: order.created_at,
            last_updated: order.updated_at,
        }
    }
}
