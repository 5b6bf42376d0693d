use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::{DeliveryMethod, NewOrder, OrderItem};
use crate::domain::product::{Product, ProductId};
use crate::pricing::{AreaQuote, MatrixQuote};

pub const MATRIX_ITEM_UNIT: &str = "шт";
pub const BOT_PAYMENT_METHOD: &str = "bank_transfer";

/// Telegram chat id; one conversation per chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    #[default]
    Idle,
    AwaitingSearch,
    AwaitingQty,
    AwaitingSillWidth,
    AwaitingSillLength,
    AwaitingNextAction,
    AwaitingDiscountConfirm,
    AwaitingDiscountValue,
    AwaitingCustomerName,
    AwaitingCustomerPhone,
}

impl ConversationStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingSearch => "awaiting_search",
            Self::AwaitingQty => "awaiting_qty",
            Self::AwaitingSillWidth => "awaiting_sill_width",
            Self::AwaitingSillLength => "awaiting_sill_length",
            Self::AwaitingNextAction => "awaiting_next_action",
            Self::AwaitingDiscountConfirm => "awaiting_discount_confirm",
            Self::AwaitingDiscountValue => "awaiting_discount_value",
            Self::AwaitingCustomerName => "awaiting_customer_name",
            Self::AwaitingCustomerPhone => "awaiting_customer_phone",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextAction {
    AddItem,
    Finalize,
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationEvent {
    StartCalculation,
    Cancel,
    Text(String),
    ProductSelected(ProductId),
    NextAction(NextAction),
    DiscountDecision(bool),
}

impl ConversationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartCalculation => "start_calculation",
            Self::Cancel => "cancel",
            Self::Text(_) => "text",
            Self::ProductSelected(_) => "product_selected",
            Self::NextAction(_) => "next_action",
            Self::DiscountDecision(_) => "discount_decision",
        }
    }
}

/// Priced line in a draft. For area items `quantity` counts packs and
/// `unit_price` is per unit of measure; matrix items are single pieces priced
/// at their rounded total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLineItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    pub unit: String,
    pub sku: Option<String>,
    pub pack_size: Decimal,
    pub line_total: Decimal,
}

impl DraftLineItem {
    pub fn from_area(product: &Product, quote: &AreaQuote) -> Self {
        Self {
            name: product.name.clone(),
            unit_price: quote.unit_price,
            quantity: Decimal::from(quote.packs_needed),
            unit: product.unit.clone(),
            sku: product.sku.clone(),
            pack_size: quote.pack_size,
            line_total: quote.line_total,
        }
    }

    pub fn from_matrix(product: &Product, quote: &MatrixQuote) -> Self {
        Self {
            name: format!(
                "{} ({}x{} мм)",
                product.name, quote.requested_width_mm, quote.length_mm
            ),
            unit_price: quote.line_total,
            quantity: Decimal::ONE,
            unit: MATRIX_ITEM_UNIT.to_string(),
            sku: product.sku.clone(),
            pack_size: Decimal::ONE,
            line_total: quote.line_total,
        }
    }

    /// Invoice row billing the packed quantity, so that price times quantity
    /// equals the line total.
    pub fn to_order_item(&self) -> OrderItem {
        OrderItem {
            name: self.name.clone(),
            price: self.unit_price,
            quantity: self.quantity * self.pack_size,
            unit: self.unit.clone(),
            sku: self.sku.clone(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("discount has already been applied")]
    DiscountAlreadyApplied,
    #[error("discount must be between 0 and 100 percent")]
    DiscountOutOfRange,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    items: Vec<DraftLineItem>,
    total: Decimal,
    discount_percent: Option<Decimal>,
}

impl OrderDraft {
    pub fn items(&self) -> &[DraftLineItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|item| item.line_total).sum()
    }

    pub fn discount_percent(&self) -> Option<Decimal> {
        self.discount_percent
    }

    pub fn push(&mut self, item: DraftLineItem) {
        self.total += item.line_total;
        self.items.push(item);
    }

    /// Scales the running total once; a second discount is rejected.
    pub fn apply_discount(&mut self, percent: Decimal) -> Result<(), DraftError> {
        if self.discount_percent.is_some() {
            return Err(DraftError::DiscountAlreadyApplied);
        }
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DraftError::DiscountOutOfRange);
        }
        self.total *= Decimal::ONE - percent / Decimal::ONE_HUNDRED;
        self.discount_percent = Some(percent);
        Ok(())
    }
}

/// Everything remembered for one chat between messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub step: ConversationStep,
    pub selected_product: Option<Product>,
    pub sill_width_mm: Option<u32>,
    pub draft: OrderDraft,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub touched_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            step: ConversationStep::Idle,
            selected_product: None,
            sill_width_mm: None,
            draft: OrderDraft::default(),
            customer_name: None,
            customer_phone: None,
            touched_at: now,
        }
    }

    /// Fresh calculation: drops the draft and all collected details.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
        self.step = ConversationStep::AwaitingSearch;
    }

    pub fn to_new_order(&self) -> NewOrder {
        NewOrder {
            customer_name: self.customer_name.clone().unwrap_or_default(),
            customer_phone: self.customer_phone.clone().unwrap_or_default(),
            customer_email: None,
            delivery_method: DeliveryMethod::Pickup,
            address: String::new(),
            payment_method: BOT_PAYMENT_METHOD.to_string(),
            items: self.draft.items().iter().map(DraftLineItem::to_order_item).collect(),
            total_amount: self.draft.total(),
        }
    }
}
