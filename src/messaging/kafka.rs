use anyhow::Context;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use std::time::Duration;

use super::{EventPublisher, PublishError};
use crate::domain::order::EventKind;
use crate::outbox::OutboxEvent;

// ============================================================================
// Kafka Event Publisher
// ============================================================================
//
// Each event kind is routed to its own durable topic; the message key is the
// event id so idempotent consumers can deduplicate redelivered events.
//
// ============================================================================

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct EventTopics {
    pub created: String,
    pub delivered: String,
    pub cancelled: String,
    pub error: String,
}

impl Default for EventTopics {
    fn default() -> Self {
        Self {
            created: "new-orders".to_string(),
            delivered: "delivered-orders".to_string(),
            cancelled: "cancelled-orders".to_string(),
            error: "error-orders".to_string(),
        }
    }
}

impl EventTopics {
    pub fn topic_for(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Created => &self.created,
            EventKind::Delivered => &self.delivered,
            EventKind::Cancelled => &self.cancelled,
            EventKind::Error => &self.error,
        }
    }
}

pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topics: EventTopics,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, topics: EventTopics) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Kafka producer")?;

        Ok(Self { producer, topics })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError> {
        let topic = self.topics.topic_for(event.kind);
        let key = event.id.to_string();

        let record = FutureRecord::to(topic).key(&key).payload(&event.payload);

        self.producer
            .send(record, rdkafka::util::Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| PublishError::Send(e.to_string()))?;

        tracing::info!(
            topic = %topic,
            event_id = %event.id,
            event_type = %event.kind,
            "Published to Kafka"
        );

        Ok(())
    }
}
