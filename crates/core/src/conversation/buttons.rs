use crate::conversation::states::NextAction;
use crate::domain::order::OrderId;
use crate::domain::product::ProductId;

const SELECT_PRODUCT_PREFIX: &str = "calc_prod_";
const GENERATE_INVOICE_PREFIX: &str = "gen_invoice_";

/// What an inline button does when pressed; encoded into Telegram callback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    SelectProduct(ProductId),
    Next(NextAction),
    Discount(bool),
    GenerateInvoice(OrderId),
}

impl ButtonAction {
    pub fn encode(&self) -> String {
        match self {
            Self::SelectProduct(id) => format!("{SELECT_PRODUCT_PREFIX}{id}"),
            Self::Next(NextAction::AddItem) => "next_add".to_string(),
            Self::Next(NextAction::Finalize) => "next_finalize".to_string(),
            Self::Next(NextAction::Cancel) => "next_cancel".to_string(),
            Self::Discount(true) => "discount_yes".to_string(),
            Self::Discount(false) => "discount_no".to_string(),
            Self::GenerateInvoice(id) => format!("{GENERATE_INVOICE_PREFIX}{id}"),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        match data {
            "next_add" => return Some(Self::Next(NextAction::AddItem)),
            "next_finalize" => return Some(Self::Next(NextAction::Finalize)),
            "next_cancel" => return Some(Self::Next(NextAction::Cancel)),
            "discount_yes" => return Some(Self::Discount(true)),
            "discount_no" => return Some(Self::Discount(false)),
            _ => {}
        }

        if let Some(id) = data.strip_prefix(SELECT_PRODUCT_PREFIX) {
            return id.parse().ok().map(|id| Self::SelectProduct(ProductId(id)));
        }
        if let Some(id) = data.strip_prefix(GENERATE_INVOICE_PREFIX) {
            return id.parse().ok().map(|id| Self::GenerateInvoice(OrderId(id)));
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self { label: label.into(), action }
    }
}
