use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{EventKind, OrderEvent};
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Event Outbox - transactional event recording + polling dispatcher
// ============================================================================
//
// Events are recorded inside the same transaction as the order-state change
// they describe, then delivered asynchronously by the dispatcher. This
// avoids the "commit may fail after publish" split-brain between database
// and broker. Delivery is at-least-once; consumers deduplicate on event id.
//
// ============================================================================

/// A durably recorded domain event awaiting delivery.
///
/// The id is the event identity: it is assigned exactly once, when the event
/// is recorded, and reused on every delivery retry.
#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub order_number: String,
    pub kind: EventKind,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn from_event(event: &OrderEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            order_number: event.order_number().to_string(),
            kind: event.kind(),
            payload: serde_json::to_string(event)?,
            created_at: Utc::now(),
        })
    }
}

/// Append an event within the caller's transaction. Never opens its own;
/// the caller decides when the unit of work commits.
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    event: &OrderEvent,
) -> Result<Uuid, StoreError> {
    let row = OutboxEvent::from_event(event)?;

    sqlx::query(
        "INSERT INTO order_events (id, order_number, event_type, payload, created_at, published) \
         VALUES ($1, $2, $3, $4, $5, false)",
    )
    .bind(row.id)
    .bind(&row.order_number)
    .bind(row.kind.as_str())
    .bind(&row.payload)
    .bind(row.created_at)
    .execute(&mut **tx)
    .await?;

    tracing::debug!(
        event_id = %row.id,
        event_type = %row.kind,
        order_number = %row.order_number,
        "Recorded outbox event"
    );

    Ok(row.id)
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Dispatcher {
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
        }
    }

    /// Publish every pending event, marking each published only after the
    /// broker acknowledged it. A failed event stays pending and is retried
    /// on the next invocation without blocking the others.
    pub async fn publish_pending(&self) -> Result<usize, StoreError> {
        let pending = self.store.pending_events().await?;
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::info!(event_count = pending.len(), "Fetched pending outbox events");

        let mut published = 0;
        for event in pending {
            match self.publisher.publish(&event).await {
                Ok(()) => {
                    // A failed mark leaves the row pending; it is re-published
                    // next cycle and deduplicated downstream on the event id.
                    if let Err(e) = self.store.mark_published(event.id).await {
                        tracing::error!(
                            error = %e,
                            event_id = %event.id,
                            "Failed to mark event published, will retry next cycle"
                        );
                        continue;
                    }
                    self.metrics
                        .outbox_events_published
                        .with_label_values(&[event.kind.as_str()])
                        .inc();
                    tracing::info!(
                        event_id = %event.id,
                        event_type = %event.kind,
                        order_number = %event.order_number,
                        "Published outbox event"
                    );
                    published += 1;
                }
                Err(e) => {
                    self.metrics.outbox_publish_failures.inc();
                    tracing::error!(
                        error = %e,
                        event_id = %event.id,
                        event_type = %event.kind,
                        "Failed to publish outbox event, will retry next cycle"
                    );
                }
            }
        }

        Ok(published)
    }
}
