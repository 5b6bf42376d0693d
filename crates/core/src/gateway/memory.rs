use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{CatalogGateway, GatewayError, OrderGateway};
use crate::domain::order::{Order, OrderId, OrderPayload, OrderStatus};
use crate::domain::product::{Product, ProductId};

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<Vec<Product>>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products: RwLock::new(products) }
    }

    pub async fn insert(&self, product: Product) {
        let mut products = self.products.write().await;
        products.retain(|existing| existing.id != product.id);
        products.push(product);
    }
}

#[async_trait]
impl CatalogGateway for InMemoryCatalog {
    async fn find_products_by_name_substring(
        &self,
        text: &str,
        limit: u32,
    ) -> Result<Vec<Product>, GatewayError> {
        let needle = text.trim().to_lowercase();
        let products = self.products.read().await;
        let mut matches: Vec<Product> = products
            .iter()
            .filter(|product| product.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, GatewayError> {
        Ok(self.products.read().await.iter().find(|product| product.id == id).cloned())
    }
}

/// Orders keyed by the local day they were numbered on.
#[derive(Default)]
pub struct InMemoryOrderBook {
    orders: RwLock<Vec<(NaiveDate, Order)>>,
}

impl InMemoryOrderBook {
    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.iter().map(|(_, order)| order.clone()).collect()
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderBook {
    async fn create_order(&self, payload: OrderPayload) -> Result<Order, GatewayError> {
        payload.details.validate().map_err(|error| GatewayError::Validation(error.to_string()))?;

        let mut orders = self.orders.write().await;
        let taken = orders.iter().any(|(day, order)| {
            *day == payload.order_day && order.order_number == payload.order_number
        });
        if taken {
            return Err(GatewayError::Conflict(format!(
                "order number {} already exists on {}",
                payload.order_number, payload.order_day
            )));
        }

        let id = OrderId(orders.len() as i64 + 1);
        let day = payload.order_day;
        let order = Order::from_payload(id, payload);
        orders.push((day, order.clone()));
        Ok(order)
    }

    async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64, GatewayError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().filter(|(_, order)| order.created_at > since).count() as u64)
    }

    async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, GatewayError> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .map(|(_, order)| order)
            .filter(|order| order.order_number.as_str() == number)
            .max_by_key(|order| (order.created_at, order.id))
            .cloned())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, GatewayError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().map(|(_, order)| order).find(|order| order.id == id).cloned())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), GatewayError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .map(|(_, order)| order)
            .find(|order| order.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("order {id}")))?;
        order.status = status;
        Ok(())
    }
}
