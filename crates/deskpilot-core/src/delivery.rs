//! Long-text delivery.
//!
//! Decides whether a piece of text goes out as one message, as ordered
//! fixed-width chunks, or as a text attachment when it is much larger than
//! the transport limit. Nothing is dropped.

use crate::reply::ReplyChannel;
use anyhow::Result;
use tracing::debug;

/// File name used for oversized output.
pub const ATTACHMENT_FILE_NAME: &str = "output.txt";

/// How a text will be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Fits in one message.
    Inline(String),
    /// Ordered slices of at most `limit` characters.
    Chunks(Vec<String>),
    /// Sent as a file.
    Attachment {
        /// File name.
        file_name: String,
        /// UTF-8 contents.
        body: String,
        /// Length of the original text in characters.
        char_count: usize,
    },
}

/// Plan delivery of `text` for a transport with `limit` characters per message.
///
/// Texts longer than `limit * attachment_multiple` become an attachment.
/// A zero `limit` is treated as 1.
#[must_use]
pub fn plan(text: &str, limit: usize, attachment_multiple: usize) -> Delivery {
    let limit = limit.max(1);
    let char_count = text.chars().count();

    if char_count <= limit {
        return Delivery::Inline(text.to_string());
    }

    if char_count > limit.saturating_mul(attachment_multiple) {
        return Delivery::Attachment {
            file_name: ATTACHMENT_FILE_NAME.to_string(),
            body: text.to_string(),
            char_count,
        };
    }

    let chars: Vec<char> = text.chars().collect();
    Delivery::Chunks(chars.chunks(limit).map(|c| c.iter().collect()).collect())
}

/// Send arbitrary-length text over `reply`.
///
/// Empty text is sent as `(empty)`.
///
/// # Errors
///
/// Returns the first transport error; later chunks are not attempted.
pub async fn send_long_text(
    reply: &dyn ReplyChannel,
    text: &str,
    attachment_multiple: usize,
) -> Result<()> {
    let text = if text.is_empty() { "(empty)" } else { text };

    match plan(text, reply.max_message_len(), attachment_multiple) {
        Delivery::Inline(message) => reply.send_text(&message).await,
        Delivery::Chunks(chunks) => {
            debug!(chunks = chunks.len(), "Sending output in chunks");
            for chunk in &chunks {
                reply.send_text(chunk).await?;
            }
            Ok(())
        }
        Delivery::Attachment {
            file_name,
            body,
            char_count,
        } => {
            debug!(char_count, "Sending output as attachment");
            reply
                .send_document(
                    &file_name,
                    body.into_bytes(),
                    &format!("Output ({char_count} chars)"),
                )
                .await
        }
    }
}
