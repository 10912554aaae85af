use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::order::{Order, OrderEvent, OrderStatus, OrderSummary};
use crate::outbox::{self, OutboxEvent};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Orders and outbox events live in the same database so a state change and
// the event describing it commit in one transaction. Structured fields
// (customer, address, items) are stored as JSON text columns.
//
// ============================================================================

pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables this service owns if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders ( \
                order_number text PRIMARY KEY, \
                user_name text NOT NULL, \
                customer text NOT NULL, \
                delivery_address text NOT NULL, \
                items text NOT NULL, \
                status text NOT NULL, \
                comments text, \
                created_at timestamptz NOT NULL \
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS order_events ( \
                id uuid PRIMARY KEY, \
                order_number text NOT NULL, \
                event_type text NOT NULL, \
                payload text NOT NULL, \
                created_at timestamptz NOT NULL, \
                published boolean NOT NULL DEFAULT false \
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS job_locks ( \
                name text PRIMARY KEY, \
                locked_by text NOT NULL, \
                locked_at timestamptz NOT NULL, \
                lock_until timestamptz NOT NULL \
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(StoreError::Corrupt)?;

    let customer: String = row.try_get("customer")?;
    let delivery_address: String = row.try_get("delivery_address")?;
    let items: String = row.try_get("items")?;

    Ok(Order {
        order_number: row.try_get("order_number")?,
        user_name: row.try_get("user_name")?,
        customer: serde_json::from_str(&customer)?,
        delivery_address: serde_json::from_str(&delivery_address)?,
        items: serde_json::from_str(&items)?,
        status,
        comments: row.try_get("comments")?,
        created_at: row.try_get("created_at")?,
    })
}

const ORDER_COLUMNS: &str =
    "order_number, user_name, customer, delivery_address, items, status, comments, created_at";

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create_order(&self, order: &Order, event: &OrderEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders \
             (order_number, user_name, customer, delivery_address, items, status, comments, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&order.order_number)
        .bind(&order.user_name)
        .bind(serde_json::to_string(&order.customer)?)
        .bind(serde_json::to_string(&order.delivery_address)?)
        .bind(serde_json::to_string(&order.items)?)
        .bind(order.status.as_str())
        .bind(&order.comments)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        outbox::record(&mut tx, event).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn update_status(
        &self,
        order_number: &str,
        status: OrderStatus,
        event: &OrderEvent,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE orders SET status = $2 WHERE order_number = $1")
            .bind(order_number)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Other(format!(
                "order not found: {order_number}"
            )));
        }

        outbox::record(&mut tx, event).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_summaries(&self, user_name: &str) -> Result<Vec<OrderSummary>, StoreError> {
        let rows =
            sqlx::query("SELECT order_number, status FROM orders WHERE user_name = $1 ORDER BY created_at")
                .bind(user_name)
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(OrderSummary {
                    order_number: row.try_get("order_number")?,
                    status: status.parse::<OrderStatus>().map_err(StoreError::Corrupt)?,
                })
            })
            .collect()
    }

    async fn find_order(
        &self,
        user_name: &str,
        order_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_name = $1 AND order_number = $2"
        ))
        .bind(user_name)
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn pending_events(&self) -> Result<Vec<OutboxEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_number, event_type, payload, created_at FROM order_events \
             WHERE published = false ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let event_type: String = row.try_get("event_type")?;
                let kind = event_type.parse().map_err(StoreError::Corrupt)?;
                let id: Uuid = row.try_get("id")?;
                let created_at: DateTime<Utc> = row.try_get("created_at")?;
                Ok(OutboxEvent {
                    id,
                    order_number: row.try_get("order_number")?,
                    kind,
                    payload: row.try_get("payload")?,
                    created_at,
                })
            })
            .collect()
    }

    async fn mark_published(&self, event_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE order_events SET published = true WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
