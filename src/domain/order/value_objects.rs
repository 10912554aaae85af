use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

/// A single order line. Unit price is fixed at order-creation time and does
/// not follow later catalog price changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub code: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Address {
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// `New` is the sole initial state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Delivered,
    Cancelled,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "ERROR" => Ok(OrderStatus::Error),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Incoming request to create an order. The owner identity is resolved by
/// the caller and never taken from this payload.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderRequest {
    pub customer: Customer,
    pub delivery_address: Address,
    pub items: Vec<OrderItem>,
    pub comments: Option<String>,
}

/// A persisted order aggregate. The order number is immutable once assigned
/// and the line items never change after creation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Order {
    pub order_number: String,
    pub user_name: String,
    pub customer: Customer,
    pub delivery_address: Address,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing projection: order number + status, nothing else.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderSummary {
    pub order_number: String,
    pub status: OrderStatus,
}
