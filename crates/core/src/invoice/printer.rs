use async_trait::async_trait;

use super::{DocumentFormat, InvoiceBuilder, InvoiceDocument, InvoiceError};
use crate::domain::order::Order;

/// Produces the deliverable invoice for an order.
#[async_trait]
pub trait InvoicePrinter: Send + Sync {
    async fn print(&self, order: &Order) -> Result<InvoiceDocument, InvoiceError>;
}

/// Delivers the rendered HTML as-is; used when no PDF converter is installed.
pub struct HtmlInvoicePrinter {
    builder: InvoiceBuilder,
}

impl HtmlInvoicePrinter {
    pub fn new(builder: InvoiceBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl InvoicePrinter for HtmlInvoicePrinter {
    async fn print(&self, order: &Order) -> Result<InvoiceDocument, InvoiceError> {
        let html = self.builder.render_html(order)?;
        Ok(InvoiceDocument::new(&order.order_number, DocumentFormat::Html, html.into_bytes()))
    }
}
