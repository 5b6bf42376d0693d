//! Telegram transport for the pidloga bot.
//!
//! - **Bot API client** (`client`) - teloxide long polling, messages, documents, callback answers
//! - **Updates** (`events`) - raw updates parsed into commands, text and button presses
//! - **Service** (`service`) - routes inbound updates to the conversation engine and order desk
//! - **Runner** (`runner`) - polling loop with reconnect backoff and one worker per chat
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → per-chat worker → BotService → ConversationEngine
//!                                                    ↓
//!                                 Outbox (sendMessage / sendDocument) ← Replies
//! ```

pub mod client;
pub mod events;
pub mod keyboard;
pub mod runner;
pub mod service;
pub mod transport;

pub use client::{TelegramClient, TelegramError};
pub use events::{BotCommand, InboundKind, InboundUpdate};
pub use runner::{PollingRunner, ReconnectPolicy, RunnerError};
pub use service::BotService;
pub use transport::{Outbox, TransportError, UpdateSource};

#[cfg(test)]
mod testing;
