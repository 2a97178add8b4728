use super::{joined, keys, reported_output, CommandContext, CommandHandler};
use crate::delivery::send_long_text;
use crate::error::CommandError;
use crate::process::{Invocation, ProcessError, ProcessRequest};
use crate::reply::ReplyChannel;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// `/sh <cmd>`: free-form shell command in the bot's working directory.
pub struct ShellCommand;

#[async_trait]
impl CommandHandler for ShellCommand {
    fn name(&self) -> &'static str {
        "sh"
    }

    fn usage(&self) -> &'static str {
        "/sh <cmd> — Run shell command"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::SHELL)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let command = joined(args);
        if command.is_empty() {
            return Err(CommandError::InvalidArgument("Usage: /sh <command>".to_string()));
        }

        let request = ProcessRequest::new(
            Invocation::Shell(command),
            Duration::from_secs(ctx.settings.shell_timeout_secs),
        );
        let output = reported_output(ctx.runner.run(request).await)
            .map_err(|e| CommandError::from_process("Command", "Check the interpreter is on PATH.", e))?;

        send_long_text(reply, &output, ctx.settings.attachment_multiple)
            .await
            .map_err(CommandError::Transport)
    }
}

/// `/claude <prompt>`: one-shot query to the Claude CLI.
pub struct ClaudeCommand;

impl ClaudeCommand {
    fn response_text(stdout: &str, stderr: &str) -> String {
        [stdout.trim(), stderr.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("(no response)")
            .to_string()
    }
}

#[async_trait]
impl CommandHandler for ClaudeCommand {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn usage(&self) -> &'static str {
        "/claude <prompt> — Ask the Claude CLI"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::CLAUDE)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let prompt = joined(args);
        if prompt.is_empty() {
            return Err(CommandError::InvalidArgument(
                "Usage: /claude <prompt>".to_string(),
            ));
        }
        reply
            .send_text("Asking Claude...")
            .await
            .map_err(CommandError::Transport)?;

        let request = ProcessRequest::new(
            Invocation::argv("claude", ["-p".to_string(), prompt]),
            Duration::from_secs(ctx.settings.claude_timeout_secs),
        );
        let text = match ctx.runner.run(request).await {
            Ok(output) => Self::response_text(&output.stdout, &output.stderr),
            Err(ProcessError::ExecutionFailed { output, .. }) => Self::response_text(&output, ""),
            Err(e) => {
                return Err(CommandError::from_process(
                    "Claude CLI",
                    "Install with: npm install -g @anthropic-ai/claude-code",
                    e,
                ))
            }
        };
        debug!(chars = text.chars().count(), "Claude response received");

        send_long_text(reply, &text, ctx.settings.attachment_multiple)
            .await
            .map_err(CommandError::Transport)
    }
}
