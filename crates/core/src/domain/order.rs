use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub i64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable order number of the form `{sequence}/{MM}/{YYYY}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn new(sequence: u64, month: u32, year: i32) -> Self {
        Self(format!("{sequence}/{month:02}/{year}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix before the first `/`; used as the invoice sequence number.
    pub fn sequence(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// File-system safe form used for document names.
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "_")
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InvoiceSent,
    Paid,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InvoiceSent => "invoice_sent",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "invoice_sent" => Ok(Self::InvoiceSent),
            "paid" => Ok(Self::Paid),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!("unknown order status `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pickup" => Ok(Self::Pickup),
            "delivery" => Ok(Self::Delivery),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown delivery method `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub unit: String,
    pub sku: Option<String>,
}

impl OrderItem {
    pub fn row_total(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Everything about an order except the identity assigned at persistence time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub address: String,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("customer name is required".to_string()));
        }
        if self.customer_phone.trim().is_empty() {
            return Err(DomainError::InvariantViolation("customer phone is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(DomainError::InvariantViolation(
                "order must contain at least one item".to_string(),
            ));
        }
        if self.total_amount < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(
                "order total must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Insert payload handed to the order store.
///
/// Numbers repeat on every day of a month, so the store keys uniqueness on
/// `(order_number, order_day)` where `order_day` is the shop's local date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderPayload {
    pub order_number: OrderNumber,
    pub order_day: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub details: NewOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub address: String,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_payload(id: OrderId, payload: OrderPayload) -> Self {
        let OrderPayload { order_number, created_at, details, .. } = payload;
        Self {
            id,
            order_number,
            customer_name: details.customer_name,
            customer_phone: details.customer_phone,
            customer_email: details.customer_email,
            delivery_method: details.delivery_method,
            address: details.address,
            payment_method: details.payment_method,
            items: details.items,
            total_amount: details.total_amount,
            status: OrderStatus::Pending,
            created_at,
        }
    }
}
