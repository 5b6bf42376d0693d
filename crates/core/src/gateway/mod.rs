//! Storage boundary for the catalog and orders. The SQLite adapter lives in
//! `pidloga-db`; in-memory stores here back tests and offline tooling.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::order::{Order, OrderId, OrderPayload, OrderStatus};
use crate::domain::product::{Product, ProductId};

pub use memory::{InMemoryCatalog, InMemoryOrderBook};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage unavailable: {0}")]
    Connection(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// Case-insensitive substring match on the product name, ordered by name.
    async fn find_products_by_name_substring(
        &self,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Product>, GatewayError>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, GatewayError>;
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Fails with [`GatewayError::Conflict`] when the order number is already taken.
    async fn create_order(&self, payload: OrderPayload) -> Result<Order, GatewayError>;

    /// Orders created strictly after `since`.
    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64, GatewayError>;

    async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, GatewayError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, GatewayError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), GatewayError>;
}
