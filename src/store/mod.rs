use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderEvent, OrderStatus, OrderSummary};
use crate::outbox::OutboxEvent;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PostgresOrderStore;

// ============================================================================
// Order Store - persistence boundary for orders and their outbox events
// ============================================================================
//
// The state-changing operations take the domain event alongside the order
// mutation and persist both in one atomic unit. That is the outbox
// guarantee: either BOTH the order and its event are committed, or NEITHER.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order and its `Created` event atomically.
    async fn create_order(&self, order: &Order, event: &OrderEvent) -> Result<(), StoreError>;

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError>;

    /// Flip an order's status and append the matching event atomically.
    async fn update_status(
        &self,
        order_number: &str,
        status: OrderStatus,
        event: &OrderEvent,
    ) -> Result<(), StoreError>;

    /// Summary projection only; must not load full order rows.
    async fn find_summaries(&self, user_name: &str) -> Result<Vec<OrderSummary>, StoreError>;

    /// Detail lookup scoped to the owner. An order number owned by someone
    /// else behaves exactly like a missing one.
    async fn find_order(
        &self,
        user_name: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// All events not yet published, oldest first.
    async fn pending_events(&self) -> Result<Vec<OutboxEvent>, StoreError>;

    async fn mark_published(&self, event_id: Uuid) -> Result<(), StoreError>;
}
