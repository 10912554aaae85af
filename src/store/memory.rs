use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::order::{Order, OrderEvent, OrderStatus, OrderSummary};
use crate::outbox::OutboxEvent;

// ============================================================================
// In-memory store for unit tests
// ============================================================================
//
// Mirrors the atomicity contract of the Postgres store under a single mutex
// and adds failure injection so the per-order error path can be exercised.
//
// ============================================================================

struct EventRow {
    event: OutboxEvent,
    published: bool,
}

#[derive(Default)]
struct Inner {
    orders: Vec<Order>,
    events: Vec<EventRow>,
    fail_updates_for: HashSet<String>,
    fail_marks_for: HashSet<Uuid>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<Inner>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `update_status` for the given order number fail. The
    /// follow-up write moving the order to `ERROR` goes through normally.
    pub fn fail_update_for(&self, order_number: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_updates_for.insert(order_number.to_string());
    }

    /// Make the next `mark_published` for the given event id fail.
    pub fn fail_mark_for(&self, event_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_marks_for.insert(event_id);
    }

    /// Append a standalone event row, as if recorded by an earlier
    /// transaction. Returns the event identity.
    pub fn append_event(&self, event: &OrderEvent) -> Result<Uuid, StoreError> {
        let row = OutboxEvent::from_event(event)?;
        let id = row.id;
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(EventRow {
            event: row,
            published: false,
        });
        Ok(id)
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    pub fn order(&self, order_number: &str) -> Option<Order> {
        let inner = self.inner.lock().unwrap();
        inner
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned()
    }

    /// All recorded events for one order, oldest first, published or not.
    pub fn events_for(&self, order_number: &str) -> Vec<OutboxEvent> {
        let inner = self.inner.lock().unwrap();
        inner
            .events
            .iter()
            .filter(|row| row.event.order_number == order_number)
            .map(|row| row.event.clone())
            .collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: &Order, event: &OrderEvent) -> Result<(), StoreError> {
        let row = OutboxEvent::from_event(event)?;
        let mut inner = self.inner.lock().unwrap();
        inner.orders.push(order.clone());
        inner.events.push(EventRow {
            event: row,
            published: false,
        });
        Ok(())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        order_number: &str,
        status: OrderStatus,
        event: &OrderEvent,
    ) -> Result<(), StoreError> {
        let row = OutboxEvent::from_event(event)?;
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_updates_for.remove(order_number) {
            return Err(StoreError::Other(format!(
                "injected failure for order {order_number}"
            )));
        }

        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.order_number == order_number)
            .ok_or_else(|| StoreError::Other(format!("order not found: {order_number}")))?;
        order.status = status;

        inner.events.push(EventRow {
            event: row,
            published: false,
        });
        Ok(())
    }

    async fn find_summaries(&self, user_name: &str) -> Result<Vec<OrderSummary>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.user_name == user_name)
            .map(|o| OrderSummary {
                order_number: o.order_number.clone(),
                status: o.status,
            })
            .collect())
    }

    async fn find_order(
        &self,
        user_name: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .iter()
            .find(|o| o.user_name == user_name && o.order_number == order_number)
            .cloned())
    }

    async fn pending_events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|row| !row.published)
            .map(|row| row.event.clone())
            .collect())
    }

    async fn mark_published(&self, event_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_marks_for.remove(&event_id) {
            return Err(StoreError::Other(format!(
                "injected failure marking event {event_id}"
            )));
        }

        let row = inner
            .events
            .iter_mut()
            .find(|row| row.event.id == event_id)
            .ok_or_else(|| StoreError::Other(format!("event not found: {event_id}")))?;
        row.published = true;
        Ok(())
    }
}
