use std::sync::Arc;

use tracing::{debug, info, warn};

use pidloga_core::conversation::messages;
use pidloga_core::conversation::{
    ButtonAction, ConversationEngine, ConversationEvent, OutboundText, Reply, SessionId, Turn,
};
use pidloga_core::domain::order::Order;
use pidloga_core::errors::ApplicationError;
use pidloga_core::invoice::InvoiceDocument;
use pidloga_core::orders::OrderDesk;

use crate::events::{BotCommand, InboundKind, InboundUpdate};
use crate::transport::Outbox;

/// Routes inbound updates for one chat at a time. Commands and conversation
/// input go to the engine and replies are delivered in order. Invoice lookups
/// by number or by button expose customer details, so they are served only in
/// the manager chat.
pub struct BotService {
    engine: Arc<ConversationEngine>,
    outbox: Arc<dyn Outbox>,
    notify_chat_id: Option<i64>,
}

impl BotService {
    pub fn new(engine: Arc<ConversationEngine>, outbox: Arc<dyn Outbox>) -> Self {
        Self { engine, outbox, notify_chat_id: None }
    }

    pub fn with_notify_chat(mut self, notify_chat_id: Option<i64>) -> Self {
        self.notify_chat_id = notify_chat_id;
        self
    }

    fn desk(&self) -> &Arc<OrderDesk> {
        self.engine.desk()
    }

    fn is_manager_chat(&self, chat_id: i64) -> bool {
        self.notify_chat_id == Some(chat_id)
    }

    async fn refuse_invoice(&self, chat_id: i64, correlation_id: &str) {
        warn!(
            event_name = "invoice.request_refused",
            session_id = chat_id,
            correlation_id,
            "invoice lookup requested outside the manager chat"
        );
        self.send_text(chat_id, &OutboundText::plain(messages::INVOICE_MANAGERS_ONLY)).await;
    }

    pub async fn handle(&self, update: InboundUpdate) {
        let correlation_id = format!("tg-{}", update.update_id);
        info!(
            event_name = "ingress.telegram.update_received",
            update_id = update.update_id,
            session_id = update.chat_id,
            kind = update.kind.label(),
            correlation_id = %correlation_id,
            "received telegram update"
        );

        let chat_id = update.chat_id;
        match update.kind {
            InboundKind::Command(command) => {
                self.handle_command(chat_id, command, &correlation_id).await
            }
            InboundKind::Text(text) => {
                self.converse(chat_id, ConversationEvent::Text(text)).await;
            }
            InboundKind::Button { callback_id, data, action } => {
                self.handle_button(chat_id, &callback_id, &data, action, &correlation_id).await
            }
        }
    }

    async fn handle_command(&self, chat_id: i64, command: BotCommand, correlation_id: &str) {
        match command {
            BotCommand::Start | BotCommand::Help | BotCommand::Unknown(_) => {
                self.send_text(chat_id, &OutboundText::plain(messages::HELP)).await;
            }
            BotCommand::Calc => self.converse(chat_id, ConversationEvent::StartCalculation).await,
            BotCommand::Cancel => self.converse(chat_id, ConversationEvent::Cancel).await,
            BotCommand::Invoice(_) if !self.is_manager_chat(chat_id) => {
                self.refuse_invoice(chat_id, correlation_id).await;
            }
            BotCommand::Invoice(None) => {
                self.send_text(chat_id, &OutboundText::plain(messages::INVOICE_USAGE)).await;
            }
            BotCommand::Invoice(Some(number)) => {
                let lookup = self.desk().invoice_by_number(&number).await;
                self.deliver_invoice(chat_id, lookup, correlation_id, || {
                    messages::order_number_not_found(&number)
                })
                .await;
            }
        }
    }

    async fn handle_button(
        &self,
        chat_id: i64,
        callback_id: &str,
        data: &str,
        action: Option<ButtonAction>,
        correlation_id: &str,
    ) {
        let ack_text = match action {
            Some(ButtonAction::GenerateInvoice(_)) if self.is_manager_chat(chat_id) => {
                Some(messages::GENERATING_INVOICE)
            }
            _ => None,
        };
        if let Err(error) = self.outbox.acknowledge(callback_id, ack_text).await {
            warn!(
                event_name = "delivery.ack_failed",
                session_id = chat_id,
                correlation_id,
                error = %error,
                "failed to acknowledge button press"
            );
        }

        let event = match action {
            Some(ButtonAction::SelectProduct(id)) => ConversationEvent::ProductSelected(id),
            Some(ButtonAction::Next(next)) => ConversationEvent::NextAction(next),
            Some(ButtonAction::Discount(accepted)) => ConversationEvent::DiscountDecision(accepted),
            Some(ButtonAction::GenerateInvoice(_)) if !self.is_manager_chat(chat_id) => {
                self.refuse_invoice(chat_id, correlation_id).await;
                return;
            }
            Some(ButtonAction::GenerateInvoice(order_id)) => {
                let lookup = self.desk().invoice_by_id(order_id).await;
                self.deliver_invoice(chat_id, lookup, correlation_id, || {
                    messages::ORDER_NOT_FOUND.to_string()
                })
                .await;
                return;
            }
            None => {
                debug!(session_id = chat_id, data, "ignoring unknown button payload");
                return;
            }
        };
        self.converse(chat_id, event).await;
    }

    async fn converse(&self, chat_id: i64, event: ConversationEvent) {
        let Turn { replies, placed_order } = self.engine.handle(SessionId(chat_id), event).await;
        let document_delivered = self.deliver(chat_id, &replies).await;

        if let Some(order) = placed_order {
            if document_delivered {
                self.mark_invoice_sent(&order).await;
            }
            self.notify_managers(&order).await;
        }
    }

    /// Sends replies in order; returns whether a document reached the chat.
    async fn deliver(&self, chat_id: i64, replies: &[Reply]) -> bool {
        let mut document_delivered = false;
        for reply in replies {
            match reply {
                Reply::Text(message) => self.send_text(chat_id, message).await,
                Reply::Document { document, caption } => {
                    document_delivered |= self.send_document(chat_id, document, caption).await;
                }
            }
        }
        document_delivered
    }

    async fn deliver_invoice(
        &self,
        chat_id: i64,
        lookup: Result<Option<(Order, InvoiceDocument)>, ApplicationError>,
        correlation_id: &str,
        not_found: impl FnOnce() -> String,
    ) {
        match lookup {
            Ok(Some((order, document))) => {
                let caption = messages::invoice_caption(&order);
                if self.send_document(chat_id, &document, &caption).await {
                    self.mark_invoice_sent(&order).await;
                }
            }
            Ok(None) => self.send_text(chat_id, &OutboundText::plain(not_found())).await,
            Err(error) => {
                warn!(
                    event_name = "invoice.request_failed",
                    session_id = chat_id,
                    correlation_id,
                    error = %error,
                    "invoice request failed"
                );
                let text = match error {
                    ApplicationError::Invoice(_) => messages::INVOICE_FAILED,
                    other => other.into_interface(correlation_id).user_message(),
                };
                self.send_text(chat_id, &OutboundText::plain(text)).await;
            }
        }
    }

    async fn mark_invoice_sent(&self, order: &Order) {
        if let Err(error) = self.desk().mark_invoice_sent(order).await {
            warn!(
                event_name = "orders.status_update_failed",
                order_number = %order.order_number,
                error = %error,
                "could not mark invoice as sent"
            );
        }
    }

    async fn notify_managers(&self, order: &Order) {
        let Some(notify_chat_id) = self.notify_chat_id else {
            return;
        };
        let notification = messages::new_order_notification(order);
        if let Err(error) = self.outbox.send_text(notify_chat_id, &notification).await {
            warn!(
                event_name = "delivery.notification_failed",
                order_number = %order.order_number,
                error = %error,
                "new order notification was not delivered"
            );
        }
    }

    async fn send_text(&self, chat_id: i64, message: &OutboundText) {
        if let Err(error) = self.outbox.send_text(chat_id, message).await {
            warn!(
                event_name = "delivery.failed",
                session_id = chat_id,
                error = %error,
                "message was not delivered"
            );
        }
    }

    async fn send_document(&self, chat_id: i64, document: &InvoiceDocument, caption: &str) -> bool {
        match self.outbox.send_document(chat_id, document, Some(caption)).await {
            Ok(()) => {
                info!(
                    event_name = "delivery.document_sent",
                    session_id = chat_id,
                    file_name = %document.file_name,
                    "invoice document delivered"
                );
                true
            }
            Err(error) => {
                warn!(
                    event_name = "delivery.failed",
                    session_id = chat_id,
                    file_name = %document.file_name,
                    error = %error,
                    "invoice document was not delivered"
                );
                false
            }
        }
    }
}
