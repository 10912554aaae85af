use serde::{Deserialize, Serialize};

use super::value_objects::{Address, Customer, OrderItem};

// ============================================================================
// Order Events - Domain Events recorded in the Outbox
// ============================================================================

/// Order Event - union type for all lifecycle events.
///
/// Serialized as a self-describing record; field names are stable across
/// versions, downstream consumers match on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    Delivered(OrderDelivered),
    Cancelled(OrderCancelled),
    Error(OrderFailed),
}

impl OrderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            OrderEvent::Created(_) => EventKind::Created,
            OrderEvent::Delivered(_) => EventKind::Delivered,
            OrderEvent::Cancelled(_) => EventKind::Cancelled,
            OrderEvent::Error(_) => EventKind::Error,
        }
    }

    pub fn order_number(&self) -> &str {
        match self {
            OrderEvent::Created(e) => &e.order_number,
            OrderEvent::Delivered(e) => &e.order_number,
            OrderEvent::Cancelled(e) => &e.order_number,
            OrderEvent::Error(e) => &e.order_number,
        }
    }
}

/// Event kind, used as the routing discriminator for the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Delivered,
    Cancelled,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "OrderCreated",
            EventKind::Delivered => "OrderDelivered",
            EventKind::Cancelled => "OrderCancelled",
            EventKind::Error => "OrderError",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderCreated" => Ok(EventKind::Created),
            "OrderDelivered" => Ok(EventKind::Delivered),
            "OrderCancelled" => Ok(EventKind::Cancelled),
            "OrderError" => Ok(EventKind::Error),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Order Created - initial event in the order lifecycle
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub order_number: String,
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    pub delivery_address: Address,
}

/// Order Delivered - order reached its terminal happy path
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderDelivered {
    pub order_number: String,
}

/// Order Cancelled - destination not serviceable
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCancelled {
    pub order_number: String,
    pub reason: String,
}

/// Order Error - unexpected failure while advancing the order.
/// Carries the customer contact so the notification consumer can reach them.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderFailed {
    pub order_number: String,
    pub reason: String,
    pub customer: Customer,
}
