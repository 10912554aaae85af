use async_trait::async_trait;

use crate::outbox::OutboxEvent;

pub mod kafka;

pub use kafka::{EventTopics, KafkaEventPublisher};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker send failed: {0}")]
    Send(String),
}

/// Outbound event channel. Implementations must only return `Ok` once the
/// broker acknowledged the message.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError>;
}
