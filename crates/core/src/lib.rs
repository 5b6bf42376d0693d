pub mod clock;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod invoice;
pub mod numbering;
pub mod orders;
pub mod pricing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use conversation::{
    ConversationEngine, ConversationEvent, ConversationStep, Reply, SessionId, SessionStore, Turn,
};
pub use domain::order::{
    DeliveryMethod, NewOrder, Order, OrderId, OrderItem, OrderNumber, OrderPayload, OrderStatus,
};
pub use domain::product::{PriceTier, Product, ProductId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use gateway::{CatalogGateway, GatewayError, OrderGateway};
pub use invoice::{
    DocumentFormat, HtmlInvoicePrinter, InvoiceBuilder, InvoiceDocument, InvoiceError,
    InvoicePrinter, PdfInvoicePrinter,
};
pub use numbering::OrderNumberAllocator;
pub use orders::OrderDesk;
pub use pricing::{price_by_area, price_by_width, AreaQuote, MatrixQuote, PricingError};
