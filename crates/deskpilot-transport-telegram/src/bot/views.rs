//! Inline keyboards.

use deskpilot_core::panel::LAYOUT;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Text of the message the panel is attached to.
pub const PANEL_TITLE: &str = "Control Panel";

/// Keyboard rendering of the control panel.
#[must_use]
pub fn panel_keyboard() -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = LAYOUT
        .iter()
        .map(|row| {
            row.iter()
                .map(|action| InlineKeyboardButton::callback(action.label(), action.callback_data()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}
