use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::OrderError;
use super::events::{OrderCancelled, OrderCreated, OrderDelivered, OrderEvent, OrderFailed};
use super::validator::OrderValidator;
use super::value_objects::{Order, OrderRequest, OrderStatus, OrderSummary};
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// Order Lifecycle Engine
// ============================================================================
//
// Creates orders and advances NEW orders to a terminal state. Every state
// change is persisted together with its outbox event in one atomic unit;
// per-order failures during batch advancement are converted to the ERROR
// terminal state and never abort the batch.
//
// ============================================================================

const DELIVERY_ALLOWED_COUNTRIES: [&str; 5] = ["INDIA", "USA", "CANADA", "GERMANY", "UK"];

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    validator: OrderValidator,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, validator: OrderValidator, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            validator,
            metrics,
        }
    }

    /// Validate and persist a new order. On validation failure nothing is
    /// persisted; on success the order and its `Created` event commit
    /// together and the generated order number is returned.
    pub async fn create_order(
        &self,
        user_name: &str,
        request: OrderRequest,
    ) -> Result<String, OrderError> {
        self.validator.validate(&request).await?;

        let order = Order {
            order_number: Uuid::new_v4().to_string(),
            user_name: user_name.to_string(),
            customer: request.customer,
            delivery_address: request.delivery_address,
            items: request.items,
            status: OrderStatus::New,
            comments: request.comments,
            created_at: Utc::now(),
        };

        let event = OrderEvent::Created(OrderCreated {
            order_number: order.order_number.clone(),
            items: order.items.clone(),
            customer: order.customer.clone(),
            delivery_address: order.delivery_address.clone(),
        });

        self.store.create_order(&order, &event).await?;

        tracing::info!(order_number = %order.order_number, "Created Order");
        Ok(order.order_number)
    }

    /// Order number + status for every order owned by the user.
    pub async fn find_orders(&self, user_name: &str) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self.store.find_summaries(user_name).await?)
    }

    /// Full order detail, scoped to the owner. An order number belonging to
    /// another owner is indistinguishable from a missing one.
    pub async fn find_user_order(
        &self,
        user_name: &str,
        order_number: &str,
    ) -> Result<Option<Order>, OrderError> {
        Ok(self.store.find_order(user_name, order_number).await?)
    }

    /// Advance every NEW order to a terminal state. Each order is evaluated
    /// and persisted independently; one order's failure does not touch the
    /// others.
    pub async fn process_new_orders(&self) -> Result<(), OrderError> {
        let orders = self.store.find_by_status(OrderStatus::New).await?;
        tracing::info!(order_count = orders.len(), "Found new orders to process");

        for order in &orders {
            self.process(order).await;
        }

        Ok(())
    }

    async fn process(&self, order: &Order) {
        match self.advance(order).await {
            Ok(status) => {
                let outcome = match status {
                    OrderStatus::Delivered => "delivered",
                    OrderStatus::Cancelled => "cancelled",
                    _ => "other",
                };
                self.metrics.orders_processed.with_label_values(&[outcome]).inc();
            }
            Err(e) => {
                tracing::error!(
                    order_number = %order.order_number,
                    error = %e,
                    "Failed to process order"
                );
                self.record_error(order, &e).await;
                self.metrics.orders_processed.with_label_values(&["error"]).inc();
            }
        }
    }

    async fn advance(&self, order: &Order) -> Result<OrderStatus, OrderError> {
        if can_be_delivered(order) {
            tracing::info!(order_number = %order.order_number, "Order can be delivered");
            let event = OrderEvent::Delivered(OrderDelivered {
                order_number: order.order_number.clone(),
            });
            self.store
                .update_status(&order.order_number, OrderStatus::Delivered, &event)
                .await?;
            Ok(OrderStatus::Delivered)
        } else {
            tracing::info!(order_number = %order.order_number, "Order can not be delivered");
            let reason = format!(
                "Can't deliver to the location: {}",
                order.delivery_address.country
            );
            let event = OrderEvent::Cancelled(OrderCancelled {
                order_number: order.order_number.clone(),
                reason,
            });
            self.store
                .update_status(&order.order_number, OrderStatus::Cancelled, &event)
                .await?;
            Ok(OrderStatus::Cancelled)
        }
    }

    /// Terminal error path: record the failure and keep going. Must never
    /// propagate past the batch loop.
    async fn record_error(&self, order: &Order, error: &OrderError) {
        let event = OrderEvent::Error(OrderFailed {
            order_number: order.order_number.clone(),
            reason: error.to_string(),
            customer: order.customer.clone(),
        });

        if let Err(e) = self
            .store
            .update_status(&order.order_number, OrderStatus::Error, &event)
            .await
        {
            tracing::error!(
                order_number = %order.order_number,
                error = %e,
                "Failed to record order error state"
            );
        }
    }
}

fn can_be_delivered(order: &Order) -> bool {
    DELIVERY_ALLOWED_COUNTRIES.contains(&order.delivery_address.country.to_uppercase().as_str())
}
