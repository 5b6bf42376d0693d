//! Fakes shared by the service and runner tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chrono_tz::Europe::Kyiv;
use rust_decimal::Decimal;
use serde_json::json;
use teloxide::types::Update;
use tokio::sync::{Mutex, Semaphore};

use pidloga_core::clock::FixedClock;
use pidloga_core::conversation::{ConversationEngine, OutboundText, SessionStore};
use pidloga_core::domain::product::{PriceTier, Product, ProductId};
use pidloga_core::gateway::{InMemoryCatalog, InMemoryOrderBook};
use pidloga_core::invoice::{HtmlInvoicePrinter, InvoiceBuilder, InvoiceDocument};
use pidloga_core::numbering::OrderNumberAllocator;
use pidloga_core::orders::OrderDesk;

use crate::events::{BotCommand, InboundKind, InboundUpdate};
use crate::service::BotService;
use crate::transport::{Outbox, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text { chat_id: i64, text: String, buttons: Vec<String> },
    Document { chat_id: i64, file_name: String, caption: Option<String> },
    Ack { callback_id: String, text: Option<String> },
}

#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<Sent>>,
    fail_documents: bool,
    gate: Option<(i64, Arc<Semaphore>)>,
}

impl RecordingOutbox {
    pub fn failing_documents() -> Self {
        Self { fail_documents: true, ..Self::default() }
    }

    /// Texts to `chat_id` wait until `gate` has a permit, like a stalled upload.
    pub fn gated(chat_id: i64, gate: Arc<Semaphore>) -> Self {
        Self { gate: Some((chat_id, gate)), ..Self::default() }
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn texts_for(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|sent| match sent {
                Sent::Text { chat_id, text, .. } if *chat_id == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send_text(&self, chat_id: i64, message: &OutboundText) -> Result<(), TransportError> {
        let _permit = match &self.gate {
            Some((gated_chat, gate)) if *gated_chat == chat_id => gate.acquire().await.ok(),
            _ => None,
        };
        let buttons = message
            .keyboard
            .iter()
            .flatten()
            .map(|button| button.action.encode())
            .collect();
        self.sent.lock().await.push(Sent::Text { chat_id, text: message.text.clone(), buttons });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: &InvoiceDocument,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        if self.fail_documents {
            return Err(TransportError::Send("file too large".to_string()));
        }
        self.sent.lock().await.push(Sent::Document {
            chat_id,
            file_name: document.file_name.clone(),
            caption: caption.map(ToString::to_string),
        });
        Ok(())
    }

    async fn acknowledge(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.sent.lock().await.push(Sent::Ack {
            callback_id: callback_id.to_string(),
            text: text.map(ToString::to_string),
        });
        Ok(())
    }
}

pub struct Fixture {
    pub service: Arc<BotService>,
    pub outbox: Arc<RecordingOutbox>,
    pub orders: Arc<InMemoryOrderBook>,
    pub sessions: Arc<SessionStore>,
}

pub fn catalog() -> Vec<Product> {
    vec![
        Product {
            id: ProductId(1),
            name: "Паркетна дошка Дуб".to_string(),
            sku: Some("PP-CH-001".to_string()),
            price: Decimal::new(100, 0),
            unit: "м²".to_string(),
            pack_size: Decimal::new(25, 1),
            price_matrix: Vec::new(),
        },
        Product {
            id: ProductId(2),
            name: "Підвіконня біле".to_string(),
            sku: Some("WS-WH-001".to_string()),
            price: Decimal::ZERO,
            unit: "шт".to_string(),
            pack_size: Decimal::ONE,
            price_matrix: vec![
                PriceTier { width: 100, price: Decimal::new(50, 0) },
                PriceTier { width: 150, price: Decimal::new(80, 0) },
                PriceTier { width: 200, price: Decimal::new(120, 0) },
            ],
        },
    ]
}

pub fn fixture(outbox: RecordingOutbox, notify_chat_id: Option<i64>) -> Fixture {
    let now = Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).single().expect("valid timestamp");
    let clock = Arc::new(FixedClock::new(now));
    let orders = Arc::new(InMemoryOrderBook::default());
    let sessions = Arc::new(SessionStore::default());
    let printer =
        Arc::new(HtmlInvoicePrinter::new(InvoiceBuilder::new(Kyiv).expect("embedded template")));
    let desk = Arc::new(OrderDesk::new(
        orders.clone(),
        printer,
        OrderNumberAllocator::new(Kyiv),
        clock.clone(),
    ));
    let engine = Arc::new(ConversationEngine::new(
        Arc::new(InMemoryCatalog::new(catalog())),
        desk,
        sessions.clone(),
        clock,
    ));
    let outbox = Arc::new(outbox);
    let service =
        Arc::new(BotService::new(engine, outbox.clone()).with_notify_chat(notify_chat_id));

    Fixture { service, outbox, orders, sessions }
}

pub fn text(update_id: i64, chat_id: i64, text: &str) -> InboundUpdate {
    InboundUpdate { update_id, chat_id, kind: InboundKind::Text(text.to_string()) }
}

pub fn command(update_id: i64, chat_id: i64, command: BotCommand) -> InboundUpdate {
    InboundUpdate { update_id, chat_id, kind: InboundKind::Command(command) }
}

pub fn button(update_id: i64, chat_id: i64, data: &str) -> InboundUpdate {
    InboundUpdate {
        update_id,
        chat_id,
        kind: InboundKind::Button {
            callback_id: format!("cb-{update_id}"),
            data: data.to_string(),
            action: pidloga_core::conversation::ButtonAction::decode(data),
        },
    }
}

fn chat(chat_id: i64) -> serde_json::Value {
    if chat_id < 0 {
        json!({"id": chat_id, "type": "supergroup", "title": "Менеджери"})
    } else {
        json!({"id": chat_id, "type": "private", "first_name": "Олена"})
    }
}

/// Text message update in the shape the Bot API delivers it.
pub fn message_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    serde_json::from_str(&json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000_i64,
            "chat": chat(chat_id),
            "from": {"id": 7, "is_bot": false, "first_name": "Олена"},
            "text": text
        }
    })
    .to_string())
    .expect("message update")
}

/// Inline button press on a message the bot sent to `chat_id`.
pub fn callback_update(update_id: i64, chat_id: i64, data: &str) -> Update {
    serde_json::from_str(&json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{update_id}"),
            "from": {"id": 7, "is_bot": false, "first_name": "Олена"},
            "chat_instance": "instance-1",
            "data": data,
            "message": {
                "message_id": 1,
                "date": 1_700_000_000_i64,
                "chat": chat(chat_id),
                "text": "Оберіть товар:"
            }
        }
    })
    .to_string())
    .expect("callback update")
}
