use super::{joined, keys, CommandContext, CommandHandler};
use crate::collaborators::KeyCombo;
use crate::config::MAX_KEY_REPEAT;
use crate::error::CommandError;
use crate::reply::ReplyChannel;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Pause between typing plain text and the follow-up screenshot.
pub const TEXT_SCREENSHOT_DELAY: Duration = Duration::from_secs(2);

const KEY_USAGE: &str = "Usage: /key <key> [N]\n\
    Singles: enter tab space esc backspace up down left right\n\
    Combos: ctrl+c ctrl+v alt+tab\n\
    Repeat: /key backspace 30";

async fn type_and_submit(ctx: &CommandContext, text: &str) -> Result<(), CommandError> {
    ctx.input
        .type_text(text)
        .await
        .map_err(CommandError::Collaborator)?;
    ctx.input
        .press(&KeyCombo::single("enter"), 1)
        .await
        .map_err(CommandError::Collaborator)
}

/// Split `[key words..] [N]` into the key text and a clamped repeat count.
#[must_use]
pub fn parse_key_args(args: &[String]) -> (String, u32) {
    if let [head @ .., last] = args {
        if !head.is_empty() && !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            let repeat = last.parse::<u32>().unwrap_or(MAX_KEY_REPEAT);
            return (joined(head), repeat.min(MAX_KEY_REPEAT));
        }
    }
    (joined(args), 1)
}

/// `/key <key> [N]`: press a key or combination.
pub struct KeyCommand;

#[async_trait]
impl CommandHandler for KeyCommand {
    fn name(&self) -> &'static str {
        "key"
    }

    fn usage(&self) -> &'static str {
        "/key <key> [N] — Press key or combo, optionally N times"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::KEY)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let (key_text, repeat) = parse_key_args(args);
        let combo = KeyCombo::parse(&key_text)
            .ok_or_else(|| CommandError::InvalidArgument(KEY_USAGE.to_string()))?;
        debug!(combo = %combo, repeat, "Pressing key");

        ctx.input
            .press(&combo, repeat)
            .await
            .map_err(CommandError::Collaborator)?;

        let label = if repeat > 1 {
            format!("Pressed: {combo} x{repeat}")
        } else {
            format!("Pressed: {combo}")
        };
        reply.send_text(&label).await.map_err(CommandError::Transport)
    }
}

/// `/type <text>`: type literal text and press Enter.
pub struct TypeCommand;

#[async_trait]
impl CommandHandler for TypeCommand {
    fn name(&self) -> &'static str {
        "type"
    }

    fn usage(&self) -> &'static str {
        "/type <text> — Type text + Enter (for text starting with /)"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::TYPE)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let text = args.join(" ");
        if text.trim().is_empty() {
            return Err(CommandError::InvalidArgument(
                "Usage: /type <text>\nTypes text + Enter.".to_string(),
            ));
        }
        type_and_submit(ctx, &text).await?;
        reply
            .send_text(&format!("Typed: {text}"))
            .await
            .map_err(CommandError::Transport)
    }
}

/// `/click x y`: left-click at absolute coordinates.
pub struct ClickCommand;

#[async_trait]
impl CommandHandler for ClickCommand {
    fn name(&self) -> &'static str {
        "click"
    }

    fn usage(&self) -> &'static str {
        "/click x y — Mouse click"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::CLICK)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let [x, y, ..] = args else {
            return Err(CommandError::InvalidArgument(
                "Usage: /click <x> <y>".to_string(),
            ));
        };
        let (Ok(x), Ok(y)) = (x.parse::<i32>(), y.parse::<i32>()) else {
            return Err(CommandError::InvalidArgument(
                "Coordinates must be integers.".to_string(),
            ));
        };

        ctx.input
            .click(x, y)
            .await
            .map_err(CommandError::Collaborator)?;
        reply
            .send_text(&format!("Clicked: ({x}, {y})"))
            .await
            .map_err(CommandError::Transport)
    }
}

/// `/focus <title>`: focus a window by partial title.
pub struct FocusCommand;

#[async_trait]
impl CommandHandler for FocusCommand {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn usage(&self) -> &'static str {
        "/focus <title> — Focus window by partial title"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::FOCUS)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let title = joined(args);
        if title.is_empty() {
            return Err(CommandError::InvalidArgument(
                "Usage: /focus <window title>".to_string(),
            ));
        }

        let text = match ctx
            .windows
            .focus(&title)
            .await
            .map_err(CommandError::Collaborator)?
        {
            Some(full_title) => format!("Focused: {full_title}"),
            None => format!("No window found matching '{title}'"),
        };
        reply.send_text(&text).await.map_err(CommandError::Transport)
    }
}

/// Plain text: typed into the focused window, then a screenshot follows.
///
/// The transport delivers the whole message as the single argument.
pub struct TextCommand;

#[async_trait]
impl CommandHandler for TextCommand {
    fn name(&self) -> &'static str {
        "text"
    }

    fn usage(&self) -> &'static str {
        "/text <text> — Same as sending plain text"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::TEXT)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let text = args.join(" ");
        if text.trim().is_empty() {
            return Err(CommandError::InvalidArgument(
                "Nothing to type.".to_string(),
            ));
        }
        type_and_submit(ctx, &text).await?;
        reply
            .send_text(&format!("Typed: {text}"))
            .await
            .map_err(CommandError::Transport)?;

        tokio::time::sleep(TEXT_SCREENSHOT_DELAY).await;
        let jpeg = ctx
            .screen
            .capture(ctx.session.crop_region())
            .await
            .map_err(CommandError::Collaborator)?;
        reply.send_photo(jpeg).await.map_err(CommandError::Transport)
    }
}
