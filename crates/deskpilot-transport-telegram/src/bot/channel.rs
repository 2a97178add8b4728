//! Reply channels backed by the Bot API.
//!
//! `TelegramReply` answers in the chat. `ButtonReply` does the same but shows
//! notices as a callback alert while the query is still unanswered.

use crate::bot::resilient::{
    send_document_resilient, send_keyboard_resilient, send_message_resilient,
    send_photo_resilient,
};
use crate::bot::views::{panel_keyboard, PANEL_TITLE};
use crate::config::{CALLBACK_ALERT_LIMIT, TELEGRAM_MESSAGE_LIMIT};
use anyhow::Result;
use async_trait::async_trait;
use deskpilot_core::reply::ReplyChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId};
use tracing::debug;

/// Replies into one chat.
#[derive(Clone)]
pub struct TelegramReply {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramReply {
    /// Channel answering in `chat_id`.
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ReplyChannel for TelegramReply {
    fn max_message_len(&self) -> usize {
        TELEGRAM_MESSAGE_LIMIT
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        send_message_resilient(&self.bot, self.chat_id, text).await?;
        Ok(())
    }

    async fn send_document(&self, file_name: &str, bytes: Vec<u8>, caption: &str) -> Result<()> {
        send_document_resilient(&self.bot, self.chat_id, file_name, bytes, caption).await?;
        Ok(())
    }

    async fn send_photo(&self, jpeg: Vec<u8>) -> Result<()> {
        send_photo_resilient(&self.bot, self.chat_id, jpeg).await?;
        Ok(())
    }

    async fn send_panel(&self) -> Result<()> {
        send_keyboard_resilient(&self.bot, self.chat_id, PANEL_TITLE, panel_keyboard()).await?;
        Ok(())
    }
}

/// Replies to a panel button press.
pub struct ButtonReply {
    chat: TelegramReply,
    query: CallbackQuery,
    answered: AtomicBool,
}

impl ButtonReply {
    /// Channel for `query`, answering in `chat_id`.
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId, query: CallbackQuery) -> Self {
        Self {
            chat: TelegramReply::new(bot, chat_id),
            query,
            answered: AtomicBool::new(false),
        }
    }

    /// Stop the button's loading indicator if nothing answered it yet.
    pub async fn acknowledge(&self) {
        if self.answered.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self
            .chat
            .bot
            .answer_callback_query(self.query.id.clone())
            .await
        {
            debug!(error = %e, "Failed to acknowledge callback query");
        }
    }
}

#[async_trait]
impl ReplyChannel for ButtonReply {
    fn max_message_len(&self) -> usize {
        self.chat.max_message_len()
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.chat.send_text(text).await
    }

    async fn send_notice(&self, text: &str) -> Result<()> {
        if text.chars().count() <= CALLBACK_ALERT_LIMIT && !self.answered.swap(true, Ordering::SeqCst)
        {
            match self
                .chat
                .bot
                .answer_callback_query(self.query.id.clone())
                .text(text)
                .show_alert(true)
                .await
            {
                Ok(_) => return Ok(()),
                // Queries expire after a while; fall back to the chat.
                Err(e) => debug!(error = %e, "Callback alert failed, notifying in chat"),
            }
        }
        self.chat.send_text(text).await
    }

    async fn send_document(&self, file_name: &str, bytes: Vec<u8>, caption: &str) -> Result<()> {
        self.chat.send_document(file_name, bytes, caption).await
    }

    async fn send_photo(&self, jpeg: Vec<u8>) -> Result<()> {
        self.chat.send_photo(jpeg).await
    }

    async fn send_panel(&self) -> Result<()> {
        self.chat.send_panel().await
    }
}
