//! Reply channel abstraction.
//!
//! Handlers answer the operator through this trait; the transport crate
//! provides the Telegram implementations.

use anyhow::Result;
use async_trait::async_trait;

/// Where the answers to one invocation go.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Largest text the transport accepts in one message, in characters.
    fn max_message_len(&self) -> usize;

    /// Send a text message.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Send a short status notice (denial, cooldown, failure).
    ///
    /// Defaults to a text message; button replies show it as a popup.
    async fn send_notice(&self, text: &str) -> Result<()> {
        self.send_text(text).await
    }

    /// Send a file.
    async fn send_document(&self, file_name: &str, bytes: Vec<u8>, caption: &str) -> Result<()>;

    /// Send a JPEG image.
    async fn send_photo(&self, jpeg: Vec<u8>) -> Result<()>;

    /// Show the inline control panel.
    async fn send_panel(&self) -> Result<()>;
}
