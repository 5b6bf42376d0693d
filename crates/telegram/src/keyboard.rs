use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use pidloga_core::conversation::Button;

/// `None` for an empty keyboard so the message is sent without markup.
pub fn inline_keyboard(rows: &[Vec<Button>]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(button.label.clone(), button.action.encode())
                })
                .collect()
        })
        .collect();

    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}
