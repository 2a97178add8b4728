//! Telegram transport settings.

use config::ConfigError;
use deskpilot_core::config::{build_config, ControllerSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest text Telegram accepts in one message, in characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Largest text shown in a callback query alert.
pub const CALLBACK_ALERT_LIMIT: usize = 200;

/// Telegram credentials loaded from environment variables.
#[derive(Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Bot token issued by `@BotFather`.
    pub telegram_token: String,
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("telegram_token", &"[REDACTED]")
            .finish()
    }
}

impl TelegramSettings {
    /// Load settings from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `TELEGRAM_TOKEN` is missing or loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }
}

/// Combined settings for the Telegram bot runtime.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Controller settings.
    pub controller: Arc<ControllerSettings>,
    /// Telegram settings.
    pub telegram: TelegramSettings,
}

impl BotSettings {
    /// Bundle controller and transport settings.
    #[must_use]
    pub fn new(controller: ControllerSettings, telegram: TelegramSettings) -> Self {
        Self {
            controller: Arc::new(controller),
            telegram,
        }
    }

    /// Load both halves from the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if either half fails to load.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::new(ControllerSettings::new()?, TelegramSettings::new()?))
    }
}
