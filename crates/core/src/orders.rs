//! Order placement and invoice lookup shared by the chat flow and the CLI.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::order::{NewOrder, Order, OrderId, OrderPayload, OrderStatus};
use crate::errors::ApplicationError;
use crate::gateway::{GatewayError, OrderGateway};
use crate::invoice::{InvoiceDocument, InvoiceError, InvoicePrinter};
use crate::numbering::OrderNumberAllocator;

pub const MAX_ALLOCATION_ATTEMPTS: u64 = 5;

pub struct OrderDesk {
    orders: Arc<dyn OrderGateway>,
    printer: Arc<dyn InvoicePrinter>,
    allocator: OrderNumberAllocator,
    clock: Arc<dyn Clock>,
    allocation_lock: Mutex<()>,
}

impl OrderDesk {
    pub fn new(
        orders: Arc<dyn OrderGateway>,
        printer: Arc<dyn InvoicePrinter>,
        allocator: OrderNumberAllocator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { orders, printer, allocator, clock, allocation_lock: Mutex::new(()) }
    }

    /// Allocates the next number for today and persists the order under it.
    ///
    /// Counting and inserting happen under one lock so concurrent sessions in
    /// this process never race for a number. A conflict means another writer
    /// took the same number on the same local day; the next sequence is tried.
    pub async fn place_order(&self, details: NewOrder) -> Result<Order, GatewayError> {
        details.validate().map_err(|error| GatewayError::Validation(error.to_string()))?;

        let _guard = self.allocation_lock.lock().await;
        let now = self.clock.now();
        let order_day = self.allocator.local_day(now);
        let orders_today = self.orders.count_orders_since(self.allocator.day_start(now)).await?;

        let mut attempt = 0;
        loop {
            let order_number = self.allocator.allocate(now, orders_today, attempt);
            info!(
                event_name = "orders.number_allocated",
                order_number = %order_number,
                orders_today,
                attempt,
                "allocated order number"
            );

            let payload = OrderPayload {
                order_number,
                order_day,
                created_at: now,
                details: details.clone(),
            };
            match self.orders.create_order(payload).await {
                Ok(order) => {
                    info!(
                        event_name = "orders.persisted",
                        order_id = %order.id,
                        order_number = %order.order_number,
                        total = %order.total_amount,
                        "order persisted"
                    );
                    return Ok(order);
                }
                Err(GatewayError::Conflict(reason)) if attempt + 1 < MAX_ALLOCATION_ATTEMPTS => {
                    warn!(
                        event_name = "orders.number_conflict",
                        attempt,
                        reason = %reason,
                        "order number already taken, trying the next one"
                    );
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub async fn print_invoice(&self, order: &Order) -> Result<InvoiceDocument, InvoiceError> {
        let document = self.printer.print(order).await?;
        info!(
            event_name = "invoice.rendered",
            order_number = %order.order_number,
            file_name = %document.file_name,
            format = document.format.extension(),
            size = document.bytes.len(),
            "invoice rendered"
        );
        Ok(document)
    }

    /// `None` when no order carries this number.
    pub async fn invoice_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<(Order, InvoiceDocument)>, ApplicationError> {
        match self.orders.find_order_by_number(order_number.trim()).await? {
            Some(order) => {
                let document = self.print_invoice(&order).await?;
                Ok(Some((order, document)))
            }
            None => Ok(None),
        }
    }

    pub async fn invoice_by_id(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, InvoiceDocument)>, ApplicationError> {
        match self.orders.find_order(id).await? {
            Some(order) => {
                let document = self.print_invoice(&order).await?;
                Ok(Some((order, document)))
            }
            None => Ok(None),
        }
    }

    /// Moves a pending order forward once its invoice reached the customer.
    pub async fn mark_invoice_sent(&self, order: &Order) -> Result<(), GatewayError> {
        if order.status != OrderStatus::Pending {
            return Ok(());
        }
        self.orders.update_order_status(order.id, OrderStatus::InvoiceSent).await?;
        info!(
            event_name = "orders.status_updated",
            order_id = %order.id,
            status = OrderStatus::InvoiceSent.as_str(),
            "order status updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use chrono_tz::Europe::Kyiv;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::OrderDesk;
    use crate::clock::FixedClock;
    use crate::domain::order::{
        DeliveryMethod, NewOrder, Order, OrderId, OrderItem, OrderPayload, OrderStatus,
    };
    use crate::gateway::{GatewayError, InMemoryOrderBook, OrderGateway};
    use crate::invoice::{DocumentFormat, HtmlInvoicePrinter, InvoiceBuilder};
    use crate::numbering::OrderNumberAllocator;

    fn details(name: &str) -> NewOrder {
        NewOrder {
            customer_name: name.to_string(),
            customer_phone: "0501234567".to_string(),
            customer_email: None,
            delivery_method: DeliveryMethod::Pickup,
            address: String::new(),
            payment_method: "bank_transfer".to_string(),
            items: vec![OrderItem {
                name: "Oak".to_string(),
                price: Decimal::new(500, 0),
                quantity: Decimal::new(66, 1),
                unit: "м²".to_string(),
                sku: None,
            }],
            total_amount: Decimal::new(3300, 0),
        }
    }

    fn march_fifth() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()
    }

    fn desk(orders: Arc<dyn OrderGateway>, clock: Arc<FixedClock>) -> OrderDesk {
        let builder = InvoiceBuilder::new(Kyiv).unwrap();
        OrderDesk::new(
            orders,
            Arc::new(HtmlInvoicePrinter::new(builder)),
            OrderNumberAllocator::new(Kyiv),
            clock,
        )
    }

    #[tokio::test]
    async fn numbers_continue_from_todays_count() {
        let book = Arc::new(InMemoryOrderBook::default());
        let clock = Arc::new(FixedClock::new(march_fifth()));
        let desk = desk(book.clone(), clock.clone());

        for _ in 0..3 {
            desk.place_order(details("Olena")).await.unwrap();
            clock.advance(Duration::minutes(1));
        }
        let fourth = desk.place_order(details("Ivan")).await.unwrap();

        assert_eq!(fourth.order_number.as_str(), "4/03/2024");
        assert_eq!(fourth.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn sequence_restarts_on_a_new_local_day() {
        let book = Arc::new(InMemoryOrderBook::default());
        let clock = Arc::new(FixedClock::new(march_fifth()));
        let desk = desk(book.clone(), clock.clone());

        desk.place_order(details("Olena")).await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2024, 3, 5, 22, 10, 0).unwrap());
        let next_day = desk.place_order(details("Ivan")).await.unwrap();

        assert_eq!(next_day.order_number.as_str(), "1/03/2024");
        assert_eq!(book.all().await.len(), 2);
    }

    #[tokio::test]
    async fn busy_day_does_not_block_numbering_later_in_the_month() {
        let book = Arc::new(InMemoryOrderBook::default());
        let clock = Arc::new(FixedClock::new(march_fifth()));
        let desk = desk(book.clone(), clock.clone());

        for _ in 0..6 {
            desk.place_order(details("Olena")).await.unwrap();
            clock.advance(Duration::minutes(5));
        }
        clock.set(Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap());
        let first = desk.place_order(details("Ivan")).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = desk.place_order(details("Petro")).await.unwrap();

        assert_eq!(first.order_number.as_str(), "1/03/2024");
        assert_eq!(second.order_number.as_str(), "2/03/2024");

        let (latest, _) = desk.invoice_by_number("1/03/2024").await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert_eq!(latest.customer_name, "Ivan");
    }

    #[tokio::test]
    async fn concurrent_placements_get_distinct_numbers() {
        let book = Arc::new(InMemoryOrderBook::default());
        let clock = Arc::new(FixedClock::new(march_fifth()));
        let desk = Arc::new(desk(book.clone(), clock));

        let handles: Vec<_> = (0..8)
            .map(|index| {
                let desk = desk.clone();
                tokio::spawn(async move { desk.place_order(details(&format!("C{index}"))).await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().order_number.as_str().to_string());
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 8);
    }

    /// Pretends another process grabbed the first numbers of the day.
    struct ContendedBook {
        inner: InMemoryOrderBook,
        taken: Vec<String>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OrderGateway for ContendedBook {
        async fn create_order(&self, payload: OrderPayload) -> Result<Order, GatewayError> {
            self.attempts.lock().await.push(payload.order_number.as_str().to_string());
            if self.taken.iter().any(|taken| taken == payload.order_number.as_str()) {
                return Err(GatewayError::Conflict("unique order_number".to_string()));
            }
            self.inner.create_order(payload).await
        }

        async fn count_orders_since(&self, since: DateTime<Utc>) -> Result<u64, GatewayError> {
            self.inner.count_orders_since(since).await
        }

        async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, GatewayError> {
            self.inner.find_order_by_number(number).await
        }

        async fn find_order(&self, id: OrderId) -> Result<Option<Order>, GatewayError> {
            self.inner.find_order(id).await
        }

        async fn update_order_status(
            &self,
            id: OrderId,
            status: OrderStatus,
        ) -> Result<(), GatewayError> {
            self.inner.update_order_status(id, status).await
        }
    }

    #[tokio::test]
    async fn conflict_retries_with_the_next_sequence() {
        let book = Arc::new(ContendedBook {
            inner: InMemoryOrderBook::default(),
            taken: vec!["1/03/2024".to_string(), "2/03/2024".to_string()],
            attempts: Mutex::new(Vec::new()),
        });
        let desk = desk(book.clone(), Arc::new(FixedClock::new(march_fifth())));

        let order = desk.place_order(details("Olena")).await.unwrap();

        assert_eq!(order.order_number.as_str(), "3/03/2024");
        assert_eq!(*book.attempts.lock().await, vec!["1/03/2024", "2/03/2024", "3/03/2024"]);
    }

    #[tokio::test]
    async fn conflicts_stop_after_bounded_attempts() {
        let taken = (1..=10).map(|sequence| format!("{sequence}/03/2024")).collect();
        let book = Arc::new(ContendedBook {
            inner: InMemoryOrderBook::default(),
            taken,
            attempts: Mutex::new(Vec::new()),
        });
        let desk = desk(book.clone(), Arc::new(FixedClock::new(march_fifth())));

        let error = desk.place_order(details("Olena")).await.unwrap_err();

        assert!(matches!(error, GatewayError::Conflict(_)));
        assert_eq!(book.attempts.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn invalid_details_never_reach_the_store() {
        let book = Arc::new(InMemoryOrderBook::default());
        let desk = desk(book.clone(), Arc::new(FixedClock::new(march_fifth())));

        let error = desk.place_order(details("  ")).await.unwrap_err();

        assert!(matches!(error, GatewayError::Validation(_)));
        assert!(book.all().await.is_empty());
    }

    #[tokio::test]
    async fn invoice_lookup_and_status_update() {
        let book = Arc::new(InMemoryOrderBook::default());
        let desk = desk(book.clone(), Arc::new(FixedClock::new(march_fifth())));
        let placed = desk.place_order(details("Olena")).await.unwrap();

        let (order, document) = desk.invoice_by_number(" 1/03/2024 ").await.unwrap().unwrap();
        assert_eq!(order.id, placed.id);
        assert_eq!(document.format, DocumentFormat::Html);
        assert_eq!(document.file_name, "Invoice_1_03_2024.html");

        assert!(desk.invoice_by_number("9/03/2024").await.unwrap().is_none());
        assert!(desk.invoice_by_id(OrderId(42)).await.unwrap().is_none());

        desk.mark_invoice_sent(&order).await.unwrap();
        let stored = book.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::InvoiceSent);
    }
}
