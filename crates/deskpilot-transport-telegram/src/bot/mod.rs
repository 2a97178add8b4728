//! Telegram bot plumbing: reply channels, views and command menu.

/// Reply channels backed by the Bot API.
pub mod channel;
/// Command menu and message helpers.
pub mod handlers;
/// Bot API calls with retry.
pub mod resilient;
/// Inline keyboards.
pub mod views;
