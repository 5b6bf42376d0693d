use async_trait::async_trait;
use teloxide::types::Update;
use thiserror::Error;

use pidloga_core::conversation::OutboundText;
use pidloga_core::invoice::InvoiceDocument;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
}

/// Source of Bot API updates. `Ok(None)` means the source is closed for good.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send_text(&self, chat_id: i64, message: &OutboundText) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        chat_id: i64,
        document: &InvoiceDocument,
        caption: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Answers a button press so the client stops its loading indicator.
    async fn acknowledge(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), TransportError>;
}
