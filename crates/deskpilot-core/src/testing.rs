//! Testing helpers.
//!
//! Provides a reply channel that records everything sent through it and a
//! constructor for a command context wired to mocked collaborators.

use crate::collaborators::{MockInputSimulator, MockScreenCapture, MockWindowInspector};
use crate::commands::CommandContext;
use crate::config::ControllerSettings;
use crate::process::ProcessRunner;
use crate::reply::ReplyChannel;
use crate::session::SessionState;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// One recorded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// Plain text message.
    Text(String),
    /// Status notice.
    Notice(String),
    /// File attachment.
    Document {
        /// File name.
        file_name: String,
        /// Contents.
        bytes: Vec<u8>,
        /// Caption.
        caption: String,
    },
    /// Photo.
    Photo(Vec<u8>),
    /// Inline control panel.
    Panel,
}

/// Reply channel that keeps every message in memory.
pub struct RecordingReply {
    limit: usize,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingReply {
    /// Recorder with the Telegram message limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(4096)
    }

    /// Recorder with a custom message limit.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, item: Sent) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Text messages only.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Notices only.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Notice(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingReply {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyChannel for RecordingReply {
    fn max_message_len(&self) -> usize {
        self.limit
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_notice(&self, text: &str) -> Result<()> {
        self.push(Sent::Notice(text.to_string()));
        Ok(())
    }

    async fn send_document(&self, file_name: &str, bytes: Vec<u8>, caption: &str) -> Result<()> {
        self.push(Sent::Document {
            file_name: file_name.to_string(),
            bytes,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn send_photo(&self, jpeg: Vec<u8>) -> Result<()> {
        self.push(Sent::Photo(jpeg));
        Ok(())
    }

    async fn send_panel(&self) -> Result<()> {
        self.push(Sent::Panel);
        Ok(())
    }
}

/// Mocked desktop collaborators, configured by the test before use.
#[derive(Default)]
pub struct MockDesktop {
    /// Screen capture mock.
    pub screen: MockScreenCapture,
    /// Window inspector mock.
    pub windows: MockWindowInspector,
    /// Input simulator mock.
    pub input: MockInputSimulator,
}

impl MockDesktop {
    /// Build a command context around these mocks.
    #[must_use]
    pub fn into_context(self, settings: ControllerSettings, working_dir: &Path) -> CommandContext {
        CommandContext {
            session: Arc::new(SessionState::new(working_dir)),
            runner: ProcessRunner::new(),
            screen: Arc::new(self.screen),
            windows: Arc::new(self.windows),
            input: Arc::new(self.input),
            settings: Arc::new(settings),
            started_at: std::time::Instant::now(),
        }
    }
}
