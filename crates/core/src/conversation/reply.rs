use crate::conversation::buttons::Button;
use crate::invoice::InvoiceDocument;

/// Chat message text with an optional inline keyboard. Text is Telegram HTML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundText {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl OutboundText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Vec::new() }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<Button>>) -> Self {
        Self { text: text.into(), keyboard }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(OutboundText),
    Document { document: InvoiceDocument, caption: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(OutboundText::plain(text))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(message) => Some(&message.text),
            Self::Document { .. } => None,
        }
    }
}
