pub mod builder;
pub mod pdf;
pub mod printer;
pub mod words;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::OrderNumber;

pub use builder::{InvoiceBuilder, SupplierDetails, SUPPLIER};
pub use pdf::{locate_wkhtmltopdf, PdfInvoicePrinter};
pub use printer::{HtmlInvoicePrinter, InvoicePrinter};
pub use words::amount_in_words;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvoiceError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for InvoiceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Html,
}

impl DocumentFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

/// Rendered invoice ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub file_name: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl InvoiceDocument {
    pub fn new(order_number: &OrderNumber, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        let file_name = format!("Invoice_{}.{}", order_number.file_stem(), format.extension());
        Self { file_name, format, bytes }
    }
}

/// Two-decimal money string, half away from zero.
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Quantity without trailing zeros, as typed by a person.
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}
