use async_trait::async_trait;
use std::time::Duration;

mod kafka;

pub use kafka::KafkaEventPublisher;

// ============================================================================
// Event Publisher
// ============================================================================
//
// Hands creation announcements to the broker. An Ack means broker
// acceptance only; downstream consumption is out of scope. Every error
// variant is a retryable delivery failure from the outbox's point of view.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publisher is not ready yet")]
    NotReady,

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("Broker unavailable (breaker open)")]
    BrokerDown,

    #[error("Broker error: {0}")]
    Broker(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one message, waiting at most the bounded publish timeout
    /// for broker acceptance.
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}
