use super::{CommandContext, CommandHandler};
use crate::config::VERSION;
use crate::error::CommandError;
use crate::reply::ReplyChannel;
use crate::utils::format_uptime;
use async_trait::async_trait;

/// `/start`: greeting followed by the help text.
pub struct StartCommand {
    help: String,
}

impl StartCommand {
    /// Greeting that embeds `help`.
    #[must_use]
    pub const fn new(help: String) -> Self {
        Self { help }
    }
}

#[async_trait]
impl CommandHandler for StartCommand {
    fn name(&self) -> &'static str {
        "start"
    }

    fn usage(&self) -> &'static str {
        "/start — Greeting and command list"
    }

    async fn handle(
        &self,
        _ctx: &CommandContext,
        _args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        reply
            .send_text(&format!("Welcome! Bot is online.\n\n{}", self.help))
            .await
            .map_err(CommandError::Transport)
    }
}

/// `/help`: the command list.
pub struct HelpCommand {
    help: String,
}

impl HelpCommand {
    /// Help command replying with `help`.
    #[must_use]
    pub const fn new(help: String) -> Self {
        Self { help }
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self) -> &'static str {
        "/help — This message"
    }

    async fn handle(
        &self,
        _ctx: &CommandContext,
        _args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        reply
            .send_text(&self.help)
            .await
            .map_err(CommandError::Transport)
    }
}

/// `/panel`: inline button panel.
pub struct PanelCommand;

#[async_trait]
impl CommandHandler for PanelCommand {
    fn name(&self) -> &'static str {
        "panel"
    }

    fn usage(&self) -> &'static str {
        "/panel — Button control panel"
    }

    async fn handle(
        &self,
        _ctx: &CommandContext,
        _args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        reply.send_panel().await.map_err(CommandError::Transport)
    }
}

/// `/status`: version, uptime, host and session state.
pub struct StatusCommand;

impl StatusCommand {
    fn render(ctx: &CommandContext) -> String {
        let crop = ctx
            .session
            .crop_region()
            .map_or_else(|| "full screen".to_string(), |r| r.to_string());
        format!(
            "Deskpilot v{VERSION}\nUptime: {}\nOS: {} ({})\nGit dir: {}\nCrop: {crop}",
            format_uptime(ctx.started_at.elapsed()),
            std::env::consts::OS,
            std::env::consts::ARCH,
            ctx.session.working_dir().display(),
        )
    }
}

#[async_trait]
impl CommandHandler for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn usage(&self) -> &'static str {
        "/status — Uptime and session info"
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        _args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        reply
            .send_text(&Self::render(ctx))
            .await
            .map_err(CommandError::Transport)
    }
}
