use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::conversation::input::{parse_discount_percent, parse_millimeters, parse_quantity};
use crate::conversation::messages;
use crate::conversation::reply::{OutboundText, Reply};
use crate::conversation::states::{
    ConversationEvent, ConversationState, ConversationStep, DraftLineItem, NextAction, SessionId,
};
use crate::conversation::store::SessionStore;
use crate::domain::order::Order;
use crate::domain::product::ProductId;
use crate::gateway::CatalogGateway;
use crate::orders::OrderDesk;
use crate::pricing::{price_by_area, price_by_width, PricingError};

pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("event `{event}` is not expected in step {}", .step.as_str())]
    UnexpectedEvent { step: ConversationStep, event: &'static str },
}

/// Output of one handled event: replies for the chat in delivery order, and
/// the order if this event placed one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Turn {
    pub replies: Vec<Reply>,
    pub placed_order: Option<Order>,
}

impl Turn {
    fn reply(reply: Reply) -> Self {
        Self { replies: vec![reply], placed_order: None }
    }

    fn text(text: impl Into<String>) -> Self {
        Self::reply(Reply::text(text))
    }

    fn replies(replies: Vec<Reply>) -> Self {
        Self { replies, placed_order: None }
    }
}

pub struct ConversationEngine {
    catalog: Arc<dyn CatalogGateway>,
    desk: Arc<OrderDesk>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    search_limit: u32,
}

impl ConversationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogGateway>,
        desk: Arc<OrderDesk>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { catalog, desk, sessions, clock, search_limit: DEFAULT_SEARCH_LIMIT }
    }

    pub fn with_search_limit(mut self, search_limit: u32) -> Self {
        self.search_limit = search_limit.max(1);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn desk(&self) -> &Arc<OrderDesk> {
        &self.desk
    }

    /// Applies one event to the chat's conversation. Callers must not run two
    /// events for the same session concurrently.
    pub async fn handle(&self, session: SessionId, event: ConversationEvent) -> Turn {
        let now = self.clock.now();
        let mut state = self.sessions.load(session, now);
        let from = state.step;
        let event_kind = event.kind();

        let turn = match self.apply(&mut state, event).await {
            Ok(turn) => {
                info!(
                    event_name = "conversation.transition_applied",
                    session_id = session.0,
                    from = from.as_str(),
                    to = state.step.as_str(),
                    event = event_kind,
                    "conversation transition applied"
                );
                turn
            }
            Err(error) => {
                warn!(
                    event_name = "conversation.transition_rejected",
                    session_id = session.0,
                    step = from.as_str(),
                    event = event_kind,
                    error = %error,
                    "conversation event rejected"
                );
                Turn::reply(self.prompt_for(&state))
            }
        };

        state.touched_at = now;
        self.sessions.save(session, state);
        turn
    }

    async fn apply(
        &self,
        state: &mut ConversationState,
        event: ConversationEvent,
    ) -> Result<Turn, ConversationError> {
        use ConversationEvent::{
            Cancel, DiscountDecision, NextAction as Next, ProductSelected, StartCalculation, Text,
        };
        use ConversationStep::{
            AwaitingCustomerName, AwaitingCustomerPhone, AwaitingDiscountConfirm,
            AwaitingDiscountValue, AwaitingNextAction, AwaitingQty, AwaitingSearch,
            AwaitingSillLength, AwaitingSillWidth, Idle,
        };

        match (state.step, event) {
            (_, StartCalculation) => {
                state.restart(self.clock.now());
                Ok(Turn::text(messages::SEARCH_PROMPT))
            }
            (Idle, Cancel) => Ok(Turn::text(messages::NOTHING_TO_CANCEL)),
            (_, Cancel) | (AwaitingNextAction, Next(NextAction::Cancel)) => {
                state.step = Idle;
                Ok(Turn::text(messages::CANCELLED))
            }
            (Idle, Text(_)) => Ok(Turn::default()),
            (AwaitingSearch, Text(query)) => Ok(self.search(&query).await),
            (AwaitingSearch, ProductSelected(id)) => Ok(self.select_product(state, id).await),
            (AwaitingQty, Text(text)) => Ok(self.price_area_item(state, &text)),
            (AwaitingSillWidth, Text(text)) => Ok(self.capture_width(state, &text)),
            (AwaitingSillLength, Text(text)) => Ok(self.price_sill_item(state, &text)),
            (AwaitingNextAction, Next(NextAction::AddItem)) => {
                state.step = AwaitingSearch;
                Ok(Turn::text(messages::SEARCH_PROMPT))
            }
            (AwaitingNextAction, Next(NextAction::Finalize)) => {
                state.step = AwaitingDiscountConfirm;
                Ok(Turn::reply(Reply::Text(messages::discount_question(state.draft.total()))))
            }
            (AwaitingDiscountConfirm, DiscountDecision(true)) => {
                state.step = AwaitingDiscountValue;
                Ok(Turn::text(messages::DISCOUNT_VALUE_PROMPT))
            }
            (AwaitingDiscountConfirm, DiscountDecision(false)) => {
                if let Err(error) = state.draft.apply_discount(rust_decimal::Decimal::ZERO) {
                    debug!(error = %error, "discount already settled");
                }
                state.step = AwaitingCustomerName;
                Ok(Turn::text(messages::CUSTOMER_NAME_PROMPT))
            }
            (AwaitingDiscountValue, Text(text)) => Ok(self.apply_discount(state, &text)),
            (AwaitingCustomerName, Text(text)) => {
                let name = text.trim();
                if name.is_empty() {
                    return Ok(Turn::text(messages::EMPTY_VALUE));
                }
                state.customer_name = Some(name.to_string());
                state.step = AwaitingCustomerPhone;
                Ok(Turn::text(messages::CUSTOMER_PHONE_PROMPT))
            }
            (AwaitingCustomerPhone, Text(text)) => Ok(self.finalize(state, &text).await),
            (step, event) => Err(ConversationError::UnexpectedEvent { step, event: event.kind() }),
        }
    }

    async fn search(&self, query: &str) -> Turn {
        let query = query.trim();
        if query.is_empty() {
            return Turn::text(messages::SEARCH_PROMPT);
        }

        match self.catalog.find_products_by_name_substring(query, self.search_limit).await {
            Ok(products) if products.is_empty() => Turn::text(messages::NO_PRODUCTS_FOUND),
            Ok(products) => {
                debug!(query, found = products.len(), "catalog search");
                Turn::reply(Reply::Text(messages::product_choices(&products)))
            }
            Err(error) => {
                warn!(event_name = "catalog.search_failed", error = %error, "catalog search failed");
                Turn::text(messages::SEARCH_UNAVAILABLE)
            }
        }
    }

    async fn select_product(&self, state: &mut ConversationState, id: ProductId) -> Turn {
        let product = match self.catalog.find_product(id).await {
            Ok(Some(product)) => product,
            Ok(None) => return Turn::text(messages::PRODUCT_GONE),
            Err(error) => {
                warn!(event_name = "catalog.lookup_failed", product_id = %id, error = %error, "product lookup failed");
                return Turn::text(messages::SEARCH_UNAVAILABLE);
            }
        };

        let prompt = if product.is_matrix_priced() {
            state.step = ConversationStep::AwaitingSillWidth;
            messages::width_prompt(&product)
        } else {
            state.step = ConversationStep::AwaitingQty;
            messages::quantity_prompt(&product)
        };
        state.selected_product = Some(product);
        state.sill_width_mm = None;
        Turn::text(prompt)
    }

    fn price_area_item(&self, state: &mut ConversationState, text: &str) -> Turn {
        let Some(product) = state.selected_product.clone() else {
            state.step = ConversationStep::AwaitingSearch;
            return Turn::text(messages::SEARCH_PROMPT);
        };
        let Ok(quantity) = parse_quantity(text) else {
            return Turn::text(messages::INVALID_QUANTITY);
        };
        let quote = match price_by_area(quantity, product.effective_pack_size(), product.price) {
            Ok(quote) => quote,
            Err(error) => {
                debug!(error = %error, "area pricing rejected input");
                return Turn::text(messages::INVALID_QUANTITY);
            }
        };

        state.draft.push(DraftLineItem::from_area(&product, &quote));
        state.selected_product = None;
        state.step = ConversationStep::AwaitingNextAction;

        Turn::replies(vec![
            Reply::text(messages::area_result(&product, &quote, state.draft.total())),
            Reply::Text(messages::next_action_menu(state.draft.items())),
        ])
    }

    fn capture_width(&self, state: &mut ConversationState, text: &str) -> Turn {
        let Ok(width_mm) = parse_millimeters(text) else {
            return Turn::text(messages::INVALID_WIDTH);
        };
        state.sill_width_mm = Some(width_mm);
        state.step = ConversationStep::AwaitingSillLength;
        Turn::text(messages::LENGTH_PROMPT)
    }

    fn price_sill_item(&self, state: &mut ConversationState, text: &str) -> Turn {
        let (Some(product), Some(width_mm)) = (state.selected_product.clone(), state.sill_width_mm)
        else {
            state.step = ConversationStep::AwaitingSearch;
            return Turn::text(messages::SEARCH_PROMPT);
        };
        let Ok(length_mm) = parse_millimeters(text) else {
            return Turn::text(messages::INVALID_LENGTH);
        };

        match price_by_width(width_mm, length_mm, &product.price_matrix) {
            Ok(quote) => {
                state.draft.push(DraftLineItem::from_matrix(&product, &quote));
                state.selected_product = None;
                state.sill_width_mm = None;
                state.step = ConversationStep::AwaitingNextAction;
                Turn::replies(vec![
                    Reply::text(messages::matrix_result(&product, &quote, state.draft.total())),
                    Reply::Text(messages::next_action_menu(state.draft.items())),
                ])
            }
            // Dead end: the calculation is dropped and the user starts over.
            Err(PricingError::WidthExceedsMaximum { max_width_mm }) => {
                state.step = ConversationStep::Idle;
                Turn::text(messages::width_exceeds_maximum(max_width_mm))
            }
            Err(error) => {
                debug!(error = %error, product_id = %product.id, "width not in price matrix");
                state.step = ConversationStep::Idle;
                Turn::text(messages::NONSTANDARD_SIZE)
            }
        }
    }

    fn apply_discount(&self, state: &mut ConversationState, text: &str) -> Turn {
        let Ok(percent) = parse_discount_percent(text) else {
            return Turn::text(messages::INVALID_DISCOUNT);
        };
        if let Err(error) = state.draft.apply_discount(percent) {
            debug!(error = %error, "discount already settled");
        }
        state.step = ConversationStep::AwaitingCustomerName;
        Turn::replies(vec![
            Reply::text(messages::discount_applied(percent, state.draft.total())),
            Reply::text(messages::CUSTOMER_NAME_PROMPT),
        ])
    }

    /// Allocates, persists and renders. A failed save keeps the session on the
    /// phone step so the user can retry; once saved the session always ends.
    async fn finalize(&self, state: &mut ConversationState, text: &str) -> Turn {
        let phone = text.trim();
        if phone.is_empty() {
            return Turn::text(messages::EMPTY_VALUE);
        }
        state.customer_phone = Some(phone.to_string());

        let order = match self.desk.place_order(state.to_new_order()).await {
            Ok(order) => order,
            Err(error) => {
                warn!(
                    event_name = "orders.persist_failed",
                    error = %error,
                    "order could not be saved"
                );
                return Turn::text(messages::order_not_saved(&error.to_string()));
            }
        };
        state.step = ConversationStep::Idle;

        let mut replies = vec![Reply::text(messages::order_placed(&order))];
        match self.desk.print_invoice(&order).await {
            Ok(document) => replies
                .push(Reply::Document { document, caption: messages::invoice_caption(&order) }),
            Err(error) => {
                warn!(
                    event_name = "invoice.render_failed",
                    order_number = %order.order_number,
                    error = %error,
                    "invoice rendering failed"
                );
                replies.push(Reply::text(messages::invoice_not_rendered(&order)));
            }
        }

        Turn { replies, placed_order: Some(order) }
    }

    /// What to show when the user does something the current step doesn't accept.
    fn prompt_for(&self, state: &ConversationState) -> Reply {
        match state.step {
            ConversationStep::Idle => Reply::text(messages::IDLE_HINT),
            ConversationStep::AwaitingSearch => Reply::text(messages::SEARCH_PROMPT),
            ConversationStep::AwaitingQty => match &state.selected_product {
                Some(product) => Reply::text(messages::quantity_prompt(product)),
                None => Reply::text(messages::SEARCH_PROMPT),
            },
            ConversationStep::AwaitingSillWidth => match &state.selected_product {
                Some(product) => Reply::text(messages::width_prompt(product)),
                None => Reply::text(messages::SEARCH_PROMPT),
            },
            ConversationStep::AwaitingSillLength => Reply::text(messages::LENGTH_PROMPT),
            ConversationStep::AwaitingNextAction => {
                let menu = messages::next_action_menu(state.draft.items());
                Reply::Text(OutboundText::with_keyboard(
                    format!("{}\n{}", messages::USE_BUTTONS, menu.text),
                    menu.keyboard,
                ))
            }
            ConversationStep::AwaitingDiscountConfirm => {
                let question = messages::discount_question(state.draft.total());
                Reply::Text(OutboundText::with_keyboard(
                    format!("{}\n{}", messages::USE_BUTTONS, question.text),
                    question.keyboard,
                ))
            }
            ConversationStep::AwaitingDiscountValue => Reply::text(messages::DISCOUNT_VALUE_PROMPT),
            ConversationStep::AwaitingCustomerName => Reply::text(messages::CUSTOMER_NAME_PROMPT),
            ConversationStep::AwaitingCustomerPhone => Reply::text(messages::CUSTOMER_PHONE_PROMPT),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use chrono_tz::Europe::Kyiv;
    use rust_decimal::Decimal;

    use super::{ConversationEngine, Turn};
    use crate::clock::FixedClock;
    use crate::conversation::buttons::ButtonAction;
    use crate::conversation::reply::Reply;
    use crate::conversation::states::{
        ConversationEvent, ConversationStep, NextAction, SessionId,
    };
    use crate::conversation::store::SessionStore;
    use crate::domain::order::{Order, OrderId, OrderPayload, OrderStatus};
    use crate::domain::product::{PriceTier, Product, ProductId};
    use crate::gateway::{GatewayError, InMemoryCatalog, InMemoryOrderBook, OrderGateway};
    use crate::invoice::{DocumentFormat, HtmlInvoicePrinter, InvoiceBuilder};
    use crate::numbering::OrderNumberAllocator;
    use crate::orders::OrderDesk;

    const CHAT: SessionId = SessionId(100);

    /// Order book whose writes can be switched off to simulate an outage.
    #[derive(Default)]
    struct SwitchableOrderBook {
        inner: InMemoryOrderBook,
        offline: AtomicBool,
    }

    #[async_trait]
    impl OrderGateway for SwitchableOrderBook {
        async fn create_order(&self, payload: OrderPayload) -> Result<Order, GatewayError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::Connection("database is locked".to_string()));
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

    struct Harness {
        engine: ConversationEngine,
        orders: Arc<SwitchableOrderBook>,
        clock: Arc<FixedClock>,
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn catalog() -> Vec<Product> {
        vec![
            Product {
                id: ProductId(1),
                name: "Oak Natural".to_string(),
                sku: Some("PP-CH-001".to_string()),
                price: dec("500"),
                unit: "м²".to_string(),
                pack_size: dec("2.2"),
                price_matrix: Vec::new(),
            },
            Product {
                id: ProductId(2),
                name: "Window Sill White".to_string(),
                sku: Some("WS-WH-001".to_string()),
                price: Decimal::ZERO,
                unit: "м.п.".to_string(),
                pack_size: Decimal::ONE,
                price_matrix: vec![
                    PriceTier { width: 150, price: dec("100") },
                    PriceTier { width: 200, price: dec("120") },
                    PriceTier { width: 300, price: dec("150") },
                ],
            },
        ]
    }

    fn harness() -> Harness {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap()));
        let orders = Arc::new(SwitchableOrderBook::default());
        let desk = Arc::new(OrderDesk::new(
            orders.clone(),
            Arc::new(HtmlInvoicePrinter::new(InvoiceBuilder::new(Kyiv).unwrap())),
            OrderNumberAllocator::new(Kyiv),
            clock.clone(),
        ));
        let engine = ConversationEngine::new(
            Arc::new(InMemoryCatalog::new(catalog())),
            desk,
            Arc::new(SessionStore::default()),
            clock.clone(),
        );
        Harness { engine, orders, clock }
    }

    impl Harness {
        async fn send(&self, event: ConversationEvent) -> Turn {
            self.engine.handle(CHAT, event).await
        }

        async fn say(&self, text: &str) -> Turn {
            self.send(ConversationEvent::Text(text.to_string())).await
        }

        fn step(&self) -> Option<ConversationStep> {
            self.engine.sessions().step(CHAT)
        }

        /// Drives the flow up to the "what next" menu with one area item.
        async fn add_oak(&self, quantity: &str) -> Turn {
            self.send(ConversationEvent::StartCalculation).await;
            self.say("oak").await;
            self.send(ConversationEvent::ProductSelected(ProductId(1))).await;
            self.say(quantity).await
        }
    }

    fn texts(turn: &Turn) -> Vec<String> {
        turn.replies.iter().filter_map(Reply::as_text).map(str::to_string).collect()
    }

    fn joined(turn: &Turn) -> String {
        texts(turn).join("\n")
    }

    #[tokio::test]
    async fn area_item_is_rounded_up_to_packs() {
        let harness = harness();

        let start = harness.send(ConversationEvent::StartCalculation).await;
        assert_eq!(texts(&start), vec!["🔍 Введіть назву товару для пошуку:"]);
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingSearch));

        let found = harness.say("OAK").await;
        let Reply::Text(choices) = &found.replies[0] else { panic!("expected choices") };
        assert_eq!(choices.keyboard.len(), 1);
        assert_eq!(choices.keyboard[0][0].action, ButtonAction::SelectProduct(ProductId(1)));
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingSearch));

        harness.send(ConversationEvent::ProductSelected(ProductId(1))).await;
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingQty));

        let result = harness.say("5,1").await;
        let summary = joined(&result);
        assert!(summary.contains("Упаковок: 3 (6.6 м²)"));
        assert!(summary.contains("Сума: 3300.00 грн"));
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingNextAction));
    }

    #[tokio::test]
    async fn sill_width_is_priced_against_the_next_tier() {
        let harness = harness();
        harness.send(ConversationEvent::StartCalculation).await;
        harness.say("sill").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(2))).await;
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingSillWidth));

        harness.say("180").await;
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingSillLength));

        let result = joined(&harness.say("2000").await);
        assert!(result.contains("Розрахункова ширина: 200 мм"));
        assert!(result.contains("Сума: 240.00 грн"));
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingNextAction));
    }

    #[tokio::test]
    async fn width_over_maximum_ends_the_calculation() {
        let harness = harness();
        harness.send(ConversationEvent::StartCalculation).await;
        harness.say("sill").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(2))).await;
        harness.say("320").await;

        let reply = joined(&harness.say("1000").await);

        assert!(reply.contains("Максимальна ширина для цього товару 300 мм"));
        assert_eq!(harness.step(), None);
    }

    #[tokio::test]
    async fn nonstandard_width_inside_matrix_ends_the_calculation() {
        let harness = harness();
        harness.send(ConversationEvent::StartCalculation).await;
        harness.say("sill").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(2))).await;
        harness.say("240").await;

        let reply = joined(&harness.say("1000").await);

        assert!(reply.contains("Нестандартний розмір"));
        assert_eq!(harness.step(), None);
    }

    #[tokio::test]
    async fn discounted_order_is_persisted_and_invoiced() {
        let harness = harness();
        harness.add_oak("5.1").await;
        harness.send(ConversationEvent::NextAction(NextAction::AddItem)).await;
        harness.say("sill").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(2))).await;
        harness.say("180").await;
        harness.say("2000").await;

        let question = harness.send(ConversationEvent::NextAction(NextAction::Finalize)).await;
        assert!(joined(&question).contains("3540.00 грн"));
        harness.send(ConversationEvent::DiscountDecision(true)).await;
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingDiscountValue));

        let discounted = joined(&harness.say("10").await);
        assert!(discounted.contains("3186.00 грн"));
        harness.say("Olena").await;
        let finished = harness.say("+380501112233").await;

        let order = finished.placed_order.clone().expect("order placed");
        assert_eq!(order.order_number.as_str(), "1/03/2024");
        assert_eq!(order.total_amount, dec("3186"));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].quantity, dec("6.6"));
        assert_eq!(order.items[0].price, dec("500"));
        assert_eq!(order.customer_name, "Olena");

        let document = finished.replies.iter().find_map(|reply| match reply {
            Reply::Document { document, caption } => Some((document, caption)),
            Reply::Text(_) => None,
        });
        let (document, caption) = document.expect("invoice attached");
        assert_eq!(document.format, DocumentFormat::Html);
        assert_eq!(document.file_name, "Invoice_1_03_2024.html");
        assert_eq!(caption, "📄 Рахунок для замовлення 1/03/2024");
        assert_eq!(harness.step(), None);
    }

    #[tokio::test]
    async fn declining_discount_keeps_the_total() {
        let harness = harness();
        harness.add_oak("4.4").await;
        harness.send(ConversationEvent::NextAction(NextAction::Finalize)).await;
        harness.send(ConversationEvent::DiscountDecision(false)).await;
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingCustomerName));

        harness.say("Ivan").await;
        let finished = harness.say("0501234567").await;

        assert_eq!(finished.placed_order.unwrap().total_amount, dec("2200"));
    }

    #[tokio::test]
    async fn failed_save_keeps_the_session_for_a_retry() {
        let harness = harness();
        harness.add_oak("2").await;
        harness.send(ConversationEvent::NextAction(NextAction::Finalize)).await;
        harness.send(ConversationEvent::DiscountDecision(false)).await;
        harness.say("Ivan").await;

        harness.orders.offline.store(true, Ordering::SeqCst);
        let failed = harness.say("0501234567").await;
        assert!(joined(&failed).contains("database is locked"));
        assert!(failed.placed_order.is_none());
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingCustomerPhone));
        assert!(harness.orders.inner.all().await.is_empty());

        harness.orders.offline.store(false, Ordering::SeqCst);
        let retried = harness.say("0501234567").await;
        assert!(retried.placed_order.is_some());
        assert_eq!(harness.orders.inner.all().await.len(), 1);
        assert_eq!(harness.step(), None);
    }

    #[tokio::test]
    async fn fourth_order_of_the_day_gets_sequence_four() {
        let harness = harness();
        for _ in 0..4 {
            harness.add_oak("1").await;
            harness.send(ConversationEvent::NextAction(NextAction::Finalize)).await;
            harness.send(ConversationEvent::DiscountDecision(false)).await;
            harness.say("Ivan").await;
            harness.say("0501234567").await;
            harness.clock.advance(Duration::minutes(10));
        }

        let numbers: Vec<String> = harness
            .orders
            .inner
            .all()
            .await
            .iter()
            .map(|order| order.order_number.as_str().to_string())
            .collect();
        assert_eq!(numbers, vec!["1/03/2024", "2/03/2024", "3/03/2024", "4/03/2024"]);
    }

    #[tokio::test]
    async fn text_while_idle_is_ignored() {
        let harness = harness();
        let turn = harness.say("hello").await;

        assert!(turn.replies.is_empty());
        assert_eq!(harness.step(), None);
    }

    #[tokio::test]
    async fn unexpected_event_reprompts_and_keeps_state() {
        let harness = harness();
        harness.add_oak("2").await;

        let turn = harness.say("what now?").await;

        let Reply::Text(message) = &turn.replies[0] else { panic!("expected text") };
        assert!(message.text.starts_with("Будь ласка, скористайтеся кнопками нижче."));
        assert_eq!(message.keyboard.len(), 3);
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingNextAction));

        let stray = harness.send(ConversationEvent::DiscountDecision(true)).await;
        assert_eq!(stray.replies.len(), 1);
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingNextAction));
    }

    #[tokio::test]
    async fn invalid_input_reprompts_without_leaving_the_step() {
        let harness = harness();
        harness.send(ConversationEvent::StartCalculation).await;
        harness.say("oak").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(1))).await;

        assert_eq!(texts(&harness.say("багато").await), vec!["❌ Будь ласка, введіть число:"]);
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingQty));

        assert_eq!(
            texts(&harness.say("nothing-like-this").await),
            vec!["❌ Будь ласка, введіть число:"]
        );
    }

    #[tokio::test]
    async fn search_without_matches_stays_in_search() {
        let harness = harness();
        harness.send(ConversationEvent::StartCalculation).await;

        let turn = harness.say("marble").await;

        assert_eq!(texts(&turn), vec!["❌ Товарів не знайдено. Спробуйте іншу назву:"]);
        assert_eq!(harness.step(), Some(ConversationStep::AwaitingSearch));
    }

    #[tokio::test]
    async fn cancel_drops_the_session_from_any_step() {
        let harness = harness();
        harness.add_oak("2").await;
        harness.send(ConversationEvent::NextAction(NextAction::Finalize)).await;

        let turn = harness.send(ConversationEvent::Cancel).await;

        assert!(joined(&turn).contains("Розрахунок скасовано"));
        assert_eq!(harness.step(), None);

        let again = harness.send(ConversationEvent::Cancel).await;
        assert!(joined(&again).contains("Немає активного розрахунку"));
    }

    #[tokio::test]
    async fn restarting_mid_flow_discards_the_draft() {
        let harness = harness();
        harness.add_oak("2").await;

        harness.send(ConversationEvent::StartCalculation).await;
        harness.say("oak").await;
        harness.send(ConversationEvent::ProductSelected(ProductId(1))).await;
        let turn = harness.say("1").await;

        assert!(joined(&turn).contains("У замовленні позицій: 1."));
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let harness = harness();
        harness.add_oak("2").await;

        let other = SessionId(200);
        harness.engine.handle(other, ConversationEvent::StartCalculation).await;

        assert_eq!(harness.step(), Some(ConversationStep::AwaitingNextAction));
        assert_eq!(
            harness.engine.sessions().step(other),
            Some(ConversationStep::AwaitingSearch)
        );
    }
}
