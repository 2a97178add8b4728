use super::{joined, keys, reported_output, CommandContext, CommandHandler};
use crate::delivery::send_long_text;
use crate::error::CommandError;
use crate::process::{Invocation, ProcessError, ProcessRequest};
use crate::reply::ReplyChannel;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Expand the shorthand forms operators type from a phone.
///
/// No arguments means `status`; a bare `log` or `diff` gets a compact
/// format; everything after `-m` in a commit is one message.
#[must_use]
pub fn git_args_with_defaults(args: &[String]) -> Vec<String> {
    let mut args: Vec<String> = match args {
        [] => vec!["status".to_string()],
        [only] if only == "log" => ["log", "--oneline", "-20"].map(String::from).to_vec(),
        [only] if only == "diff" => ["diff", "--stat"].map(String::from).to_vec(),
        _ => args.to_vec(),
    };

    if args.iter().any(|a| a == "commit") {
        if let Some(m) = args.iter().position(|a| a == "-m") {
            if m + 1 < args.len() {
                let message = args[m + 1..].join(" ");
                args.truncate(m + 1);
                args.push(message);
            }
        }
    }
    args
}

/// `/git [args]`: git in the session working directory.
///
/// `/git cd [dir]` shows or changes that directory and is not rate limited.
pub struct GitCommand;

impl GitCommand {
    fn change_dir(ctx: &CommandContext, target: &[String]) -> Result<String, CommandError> {
        let dir = if target.is_empty() {
            ctx.session.working_dir()
        } else {
            ctx.session.set_working_dir(joined(target))?
        };
        Ok(format!("Git dir: {}", dir.display()))
    }
}

#[async_trait]
impl CommandHandler for GitCommand {
    fn name(&self) -> &'static str {
        "git"
    }

    fn usage(&self) -> &'static str {
        "/git [args] — Git in working dir (/git cd <dir> to switch)"
    }

    fn cooldown_key(&self, args: &[String]) -> Option<&'static str> {
        match args.first() {
            Some(sub) if sub == "cd" => None,
            _ => Some(keys::GIT),
        }
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        if let Some((sub, target)) = args.split_first() {
            if sub == "cd" {
                let text = Self::change_dir(ctx, target)?;
                return reply.send_text(&text).await.map_err(CommandError::Transport);
            }
        }

        let dir = ctx.session.working_dir();
        let git_args = git_args_with_defaults(args);
        debug!(args = ?git_args, dir = %dir.display(), "Running git");

        let request = ProcessRequest::new(
            Invocation::argv("git", git_args),
            Duration::from_secs(ctx.settings.git_timeout_secs),
        )
        .in_dir(&dir);

        let output = reported_output(ctx.runner.run(request).await).map_err(|e| match e {
            ProcessError::NotFound { .. } => CommandError::ExternalToolMissing {
                tool: "git".to_string(),
                hint: "Install git and add it to PATH.".to_string(),
            },
            other => CommandError::from_process("Git command", "", other),
        })?;

        let text = format!("[{}]\n{output}", dir.display());
        send_long_text(reply, &text, ctx.settings.attachment_multiple)
            .await
            .map_err(CommandError::Transport)
    }
}
