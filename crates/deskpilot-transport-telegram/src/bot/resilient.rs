//! Bot API calls wrapped in
//! [`deskpilot_core::utils::retry_transport_operation`].
//!
//! Every request is rebuilt per attempt, so uploads clone their payload.

use anyhow::{anyhow, Result};
use deskpilot_core::utils::retry_transport_operation;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, Message};

/// Send a plain text message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Send a message carrying an inline keyboard.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_keyboard_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
) -> Result<Message> {
    let text = text.into();
    retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .reply_markup(keyboard.clone())
            .await
            .map_err(|e| anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Upload a document with a caption.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_document_resilient(
    bot: &Bot,
    chat_id: ChatId,
    file_name: &str,
    bytes: Vec<u8>,
    caption: &str,
) -> Result<Message> {
    let file_name = file_name.to_string();
    let make_file = || InputFile::memory(bytes.clone()).file_name(file_name.clone());
    retry_transport_operation(|| async {
        bot.send_document(chat_id, make_file())
            .caption(caption)
            .await
            .map_err(|e| anyhow!("Telegram document error: {e}"))
    })
    .await
}

/// Upload a JPEG as a photo.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_photo_resilient(bot: &Bot, chat_id: ChatId, jpeg: Vec<u8>) -> Result<Message> {
    let make_file = || InputFile::memory(jpeg.clone()).file_name("screen.jpg");
    retry_transport_operation(|| async {
        bot.send_photo(chat_id, make_file())
            .await
            .map_err(|e| anyhow!("Telegram photo error: {e}"))
    })
    .await
}
