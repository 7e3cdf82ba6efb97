use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer},
};

use crate::utils::{BreakerConfig, FailureBreaker};

use super::{EventPublisher, PublishError};

// ============================================================================
// Kafka Event Publisher
// ============================================================================
//
// Wraps a FutureProducer built once at process start. Publishes fail fast
// with NotReady until the broker metadata probe has succeeded, and a
// failure breaker rejects calls while the broker looks down.
//
// ============================================================================

pub struct KafkaEventPublisher {
    producer: FutureProducer,
    breaker: FailureBreaker,
    ready: AtomicBool,
    publish_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, publish_timeout: Duration) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set(
                "message.timeout.ms",
                publish_timeout.as_millis().to_string(),
            )
            .create()?;

        let breaker = FailureBreaker::new(BreakerConfig {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            success_threshold: 3,
        });

        Ok(Self {
            producer,
            breaker,
            ready: AtomicBool::new(false),
            publish_timeout,
        })
    }

    /// Probe broker metadata and flip the publisher to ready.
    ///
    /// fetch_metadata blocks, so it runs on the blocking pool.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || {
            producer.client().fetch_metadata(None, timeout)
        })
        .await??;

        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Kafka producer is connected and ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        if !self.is_ready() {
            return Err(PublishError::NotReady);
        }

        if self.breaker.check().await.is_err() {
            tracing::warn!(topic = %topic, "Breaker open, rejecting publish");
            return Err(PublishError::BrokerDown);
        }

        let record = FutureRecord::to(topic).key(key).payload(payload);

        let send = self
            .producer
            .send(record, rdkafka::util::Timeout::After(self.publish_timeout));

        match tokio::time::timeout(self.publish_timeout, send).await {
            Ok(Ok(_)) => {
                self.breaker.record_success().await;
                tracing::info!(topic = %topic, key = %key, "Published to Kafka");
                Ok(())
            }
            Ok(Err((err, _))) => {
                self.breaker.record_failure().await;
                tracing::error!(error = %err, topic = %topic, "Failed to publish to Kafka");
                Err(PublishError::Broker(err.to_string()))
            }
            Err(_) => {
                self.breaker.record_failure().await;
                tracing::error!(topic = %topic, "Publish timed out");
                Err(PublishError::Timeout(self.publish_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_before_ready_fails_fast() {
        let publisher =
            KafkaEventPublisher::new("127.0.0.1:9092", Duration::from_secs(5)).unwrap();

        assert!(!publisher.is_ready());
        let err = publisher
            .publish("order-created", "key", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NotReady));
    }
}
