use deskpilot_core::auth::Identity;
use deskpilot_core::dispatcher::Invocation;
use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;

/// Command menu published to Telegram.
///
/// Parsing happens in the core dispatcher; this enum only feeds
/// `set_my_commands`.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Desktop control commands:")]
pub enum Command {
    /// `/start`.
    #[command(description = "Welcome message")]
    Start,
    /// `/help`.
    #[command(description = "List commands")]
    Help,
    /// `/panel`.
    #[command(description = "Button panel")]
    Panel,
    /// `/status`.
    #[command(description = "Bot status")]
    Status,
    /// `/screen`.
    #[command(description = "Screenshot")]
    Screen,
    /// `/window`.
    #[command(description = "Active window screenshot")]
    Window,
    /// `/crop`.
    #[command(description = "Set or clear the screenshot region")]
    Crop,
    /// `/key`.
    #[command(description = "Press a key or combo")]
    Key,
    /// `/type`.
    #[command(description = "Type text and press Enter")]
    Type,
    /// `/click`.
    #[command(description = "Click at coordinates")]
    Click,
    /// `/focus`.
    #[command(description = "Focus a window by title")]
    Focus,
    /// `/sh`.
    #[command(description = "Run a shell command")]
    Sh,
    /// `/git`.
    #[command(description = "Run git in the working directory")]
    Git,
    /// `/build`.
    #[command(description = "Run the project build")]
    Build,
    /// `/apk`.
    #[command(description = "Send or list APKs")]
    Apk,
    /// `/file`.
    #[command(description = "Send a file")]
    File,
    /// `/claude`.
    #[command(description = "Ask Claude Code")]
    Claude,
}

/// Identity of a Telegram user.
#[must_use]
pub fn identity_of(user: &User) -> Identity {
    Identity(user.id.0.cast_signed())
}

/// Sender of a message, `None` for channel posts and anonymous admins.
#[must_use]
pub fn get_sender(msg: &Message) -> Option<Identity> {
    msg.from.as_ref().map(identity_of)
}

/// Turn an incoming text message into an invocation.
///
/// Returns `None` for messages without text.
#[must_use]
pub fn message_invocation(msg: &Message) -> Option<Invocation> {
    Invocation::from_text(msg.text()?, get_sender(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_core::commands::CommandRegistry;

    #[test]
    fn test_menu_commands_are_registered() {
        let registry = CommandRegistry::with_default_handlers();
        for entry in Command::bot_commands() {
            let name = entry.command.trim_start_matches('/');
            assert!(registry.get(name).is_some(), "{name} missing from registry");
        }
        assert_eq!(Command::bot_commands().len(), 17);
    }
}
