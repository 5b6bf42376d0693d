use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, CallbackQueryId, ChatId, InputFile, ParseMode, Update};
use teloxide::RequestError;
use thiserror::Error;
use tracing::debug;

use pidloga_core::conversation::OutboundText;
use pidloga_core::invoice::InvoiceDocument;

use crate::keyboard::inline_keyboard;
use crate::transport::{Outbox, TransportError, UpdateSource};

const ALLOWED_UPDATES: [AllowedUpdate; 2] = [AllowedUpdate::Message, AllowedUpdate::CallbackQuery];
const REDACTED: &str = "***";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelegramError {
    #[error("telegram client setup failed: {0}")]
    Setup(String),
    #[error("telegram request failed: {0}")]
    Request(String),
}

/// Bot API client over teloxide. Request errors are scrubbed of the token
/// before they leave this type.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
    api_url: String,
    token: SecretString,
    poll_timeout_secs: u32,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(
        api_url: impl Into<String>,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, TelegramError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&api_url)
            .map_err(|error| TelegramError::Setup(format!("api url `{api_url}`: {error}")))?;

        // Long polls hold the connection open for the whole poll timeout.
        let http = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()
            .map_err(|error| TelegramError::Setup(error.without_url().to_string()))?;
        let bot = Bot::with_client(token.expose_secret(), http).set_api_url(url);

        Ok(Self {
            bot,
            api_url,
            token,
            poll_timeout_secs: u32::try_from(poll_timeout_secs).unwrap_or(u32::MAX),
        })
    }

    fn request_error(&self, error: RequestError) -> TelegramError {
        TelegramError::Request(redact(&error.to_string(), self.token.expose_secret()))
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let mut request = self
            .bot
            .get_updates()
            .timeout(self.poll_timeout_secs)
            .allowed_updates(ALLOWED_UPDATES.to_vec());
        if let Some(offset) = offset {
            let offset = i32::try_from(offset).map_err(|_| {
                TelegramError::Request(format!("update offset {offset} is out of range"))
            })?;
            request = request.offset(offset);
        }

        let updates = request.await.map_err(|error| self.request_error(error))?;
        debug!(method = "getUpdates", count = updates.len(), "telegram api responded");
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        message: &OutboundText,
    ) -> Result<(), TelegramError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), message.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = inline_keyboard(&message.keyboard) {
            request = request.reply_markup(markup);
        }

        request.await.map_err(|error| self.request_error(error))?;
        debug!(method = "sendMessage", session_id = chat_id, "telegram api responded");
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: i64,
        document: &InvoiceDocument,
        caption: Option<&str>,
    ) -> Result<(), TelegramError> {
        let file = InputFile::memory(document.bytes.clone()).file_name(document.file_name.clone());
        let mut request = self.bot.send_document(ChatId(chat_id), file);
        if let Some(caption) = caption {
            request = request.caption(caption.to_string()).parse_mode(ParseMode::Html);
        }

        request.await.map_err(|error| self.request_error(error))?;
        debug!(
            method = "sendDocument",
            session_id = chat_id,
            mime_type = document.format.mime_type(),
            "telegram api responded"
        );
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut request = self.bot.answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(text) = text {
            request = request.text(text.to_string());
        }

        request.await.map_err(|error| self.request_error(error))?;
        Ok(())
    }
}

fn redact(message: &str, token: &str) -> String {
    if token.is_empty() {
        return message.to_string();
    }
    message.replace(token, REDACTED)
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        self.get_updates(offset)
            .await
            .map(Some)
            .map_err(|error| TransportError::Receive(error.to_string()))
    }
}

#[async_trait]
impl Outbox for TelegramClient {
    async fn send_text(&self, chat_id: i64, message: &OutboundText) -> Result<(), TransportError> {
        self.send_message(chat_id, message)
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: &InvoiceDocument,
        caption: Option<&str>,
    ) -> Result<(), TransportError> {
        TelegramClient::send_document(self, chat_id, document, caption)
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn acknowledge(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answer_callback_query(callback_id, text)
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }
}
