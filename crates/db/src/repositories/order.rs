use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::debug;

use pidloga_core::domain::order::{
    DeliveryMethod, Order, OrderId, OrderItem, OrderNumber, OrderPayload, OrderStatus,
};
use pidloga_core::gateway::{GatewayError, OrderGateway};

use super::{decode_error, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_phone, customer_email,
    delivery_method, address, payment_method, items, total_amount, status, created_at";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, payload: OrderPayload) -> Result<Order, RepositoryError> {
        let items = serde_json::to_string(&payload.details.items).map_err(decode_error)?;
        let created_at = encode_timestamp(payload.created_at);

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO customer_order (order_number, order_day, customer_name,
                                         customer_phone, customer_email, delivery_method,
                                         address, payment_method, items, total_amount,
                                         status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(payload.order_number.as_str())
        .bind(payload.order_day.format("%Y-%m-%d").to_string())
        .bind(&payload.details.customer_name)
        .bind(&payload.details.customer_phone)
        .bind(&payload.details.customer_email)
        .bind(payload.details.delivery_method.as_str())
        .bind(&payload.details.address)
        .bind(&payload.details.payment_method)
        .bind(items)
        .bind(payload.details.total_amount.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(&created_at)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            event_name = "persistence.order.inserted",
            order_id = id,
            order_number = %payload.order_number,
            order_day = %payload.order_day,
            "order row inserted"
        );

        Ok(Order::from_payload(OrderId(id), payload))
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM customer_order WHERE created_at > ?")
                .bind(encode_timestamp(since))
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    /// Numbers repeat across days of a month; the most recent order wins.
    async fn find_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE order_number = ?
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("UPDATE customer_order SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(encode_timestamp(Utc::now()))
                .bind(id.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_order(row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let order_number: String = row.try_get("order_number").map_err(decode_error)?;
    let customer_name: String = row.try_get("customer_name").map_err(decode_error)?;
    let customer_phone: String = row.try_get("customer_phone").map_err(decode_error)?;
    let customer_email: Option<String> = row.try_get("customer_email").map_err(decode_error)?;
    let delivery_method: String = row.try_get("delivery_method").map_err(decode_error)?;
    let address: String = row.try_get("address").map_err(decode_error)?;
    let payment_method: String = row.try_get("payment_method").map_err(decode_error)?;
    let items: String = row.try_get("items").map_err(decode_error)?;
    let total_amount: String = row.try_get("total_amount").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    let items: Vec<OrderItem> = serde_json::from_str(&items)
        .map_err(|error| RepositoryError::Decode(format!("items: {error}")))?;

    Ok(Order {
        id: OrderId(id),
        order_number: OrderNumber::from(order_number),
        customer_name,
        customer_phone,
        customer_email,
        delivery_method: DeliveryMethod::from_str(&delivery_method).map_err(decode_error)?,
        address,
        payment_method,
        items,
        total_amount: Decimal::from_str(&total_amount)
            .map_err(|error| RepositoryError::Decode(format!("total_amount: {error}")))?,
        status: OrderStatus::from_str(&status).map_err(decode_error)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl OrderGateway for SqlOrderRepository {
    async fn create_order(&self, payload: OrderPayload) -> Result<Order, GatewayError> {
        payload
            .details
            .validate()
            .map_err(|error| GatewayError::Validation(error.to_string()))?;
        Ok(self.insert(payload).await?)
    }

    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64, GatewayError> {
        Ok(self.count_since(since).await?)
    }

    async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, GatewayError> {
        Ok(self.find_by_number(number).await?)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, GatewayError> {
        Ok(self.find_by_id(id).await?)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), GatewayError> {
        match self.set_status(id, status).await? {
            0 => Err(GatewayError::NotFound(format!("order {id}"))),
            _ => Ok(()),
        }
    }
}
