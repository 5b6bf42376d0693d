use teloxide::types::{CallbackQuery, Message, Update, UpdateKind};

use pidloga_core::conversation::ButtonAction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub chat_id: i64,
    pub kind: InboundKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    Command(BotCommand),
    Text(String),
    Button { callback_id: String, data: String, action: Option<ButtonAction> },
}

impl InboundKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Text(_) => "text",
            Self::Button { .. } => "button",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Calc,
    Cancel,
    Invoice(Option<String>),
    Unknown(String),
}

/// Converts a Bot API update into an inbound event; updates the bot does not
/// act on (edits, service messages, stickers) yield `None`.
pub fn parse_update(update: Update) -> Option<InboundUpdate> {
    let update_id = i64::from(update.id.0);
    match update.kind {
        UpdateKind::Message(message) => parse_message(update_id, &message),
        UpdateKind::CallbackQuery(callback) => parse_callback(update_id, callback),
        _ => None,
    }
}

fn parse_message(update_id: i64, message: &Message) -> Option<InboundUpdate> {
    let text = message.text()?;
    let kind = match parse_command(text) {
        Some(command) => InboundKind::Command(command),
        None => InboundKind::Text(text.to_string()),
    };
    Some(InboundUpdate { update_id, chat_id: message.chat.id.0, kind })
}

/// Presses on messages too old to be delivered fall back to the sender's
/// private chat.
fn parse_callback(update_id: i64, callback: CallbackQuery) -> Option<InboundUpdate> {
    let chat_id = match callback.regular_message() {
        Some(message) => message.chat.id.0,
        None => i64::try_from(callback.from.id.0).ok()?,
    };
    let data = callback.data.unwrap_or_default();
    let action = ButtonAction::decode(&data);
    Some(InboundUpdate {
        update_id,
        chat_id,
        kind: InboundKind::Button { callback_id: callback.id.to_string(), data, action },
    })
}

/// Slash-prefixed text is always a command, known or not. A `@botname`
/// suffix on the command word is ignored.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix('/')?;

    let (word, args) = match body.split_once(char::is_whitespace) {
        Some((word, args)) => (word, args.trim()),
        None => (body, ""),
    };
    let name = word.split('@').next().unwrap_or_default().to_lowercase();

    let command = match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "calc" => BotCommand::Calc,
        "cancel" => BotCommand::Cancel,
        "invoice" => {
            BotCommand::Invoice(args.split_whitespace().next().map(ToString::to_string))
        }
        _ => BotCommand::Unknown(name),
    };
    Some(command)
}
