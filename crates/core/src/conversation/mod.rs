//! Per-chat calculation flow: search, price, collect customer details and
//! place the order.

pub mod buttons;
pub mod engine;
pub mod input;
pub mod messages;
pub mod reply;
pub mod states;
pub mod store;

pub use buttons::{Button, ButtonAction};
pub use engine::{ConversationEngine, ConversationError, Turn, DEFAULT_SEARCH_LIMIT};
pub use reply::{OutboundText, Reply};
pub use states::{
    ConversationEvent, ConversationState, ConversationStep, DraftLineItem, NextAction,
    OrderDraft, SessionId,
};
pub use store::SessionStore;
