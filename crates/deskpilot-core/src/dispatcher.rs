//! Invocation dispatch pipeline.
//!
//! Every invocation runs through the interceptor chain of its ingress
//! (authorization, then cooldown), then its handler, and ends in exactly one
//! [`Outcome`]. Denials, cooldowns and failures each produce one notice.

use crate::auth::{AuthorizationGate, Identity};
use crate::commands::{CommandContext, CommandHandler, CommandRegistry};
use crate::error::CommandError;
use crate::interceptors::{
    AuthorizationStage, CooldownStage, InterceptorChain, StageContext, Verdict,
};
use crate::panel::ButtonAction;
use crate::rate_limit::RateLimiter;
use crate::reply::ReplyChannel;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which ingress an invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingress {
    /// Typed command or plain text.
    Command,
    /// Inline panel button.
    Button,
}

/// One request from the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Command name without slash, or the button id for button presses.
    pub command: String,
    /// Whitespace-separated arguments.
    pub args: Vec<String>,
    /// Sender, `None` when the transport could not resolve one.
    pub sender: Option<Identity>,
    /// Origin.
    pub ingress: Ingress,
}

impl Invocation {
    /// Typed command invocation.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<String>, sender: Option<Identity>) -> Self {
        Self {
            command: name.into(),
            args,
            sender,
            ingress: Ingress::Command,
        }
    }

    /// Parse a chat message.
    ///
    /// `/cmd@bot a b` becomes `cmd` with two arguments; anything else is the
    /// `text` command carrying the whole message. Blank messages yield `None`.
    #[must_use]
    pub fn from_text(text: &str, sender: Option<Identity>) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let Some(body) = trimmed.strip_prefix('/') else {
            return Some(Self::new("text", vec![text.to_string()], sender));
        };

        let mut parts = body.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        Some(Self::new(
            name,
            parts.map(ToString::to_string).collect(),
            sender,
        ))
    }
}

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum Outcome {
    /// Handler ran and replied.
    Replied,
    /// Sender is not the operator.
    Denied,
    /// Cooldown active.
    Throttled {
        /// Whole seconds to wait.
        remaining_secs: u64,
    },
    /// Handler reported an error.
    Failed(CommandError),
}

impl Outcome {
    /// Notice sent to the operator for this outcome, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::Replied => None,
            Self::Denied => Some(CommandError::Unauthorized.to_string()),
            Self::Throttled { remaining_secs } => Some(
                CommandError::Throttled {
                    remaining_secs: *remaining_secs,
                }
                .to_string(),
            ),
            Self::Failed(e) => Some(e.to_string()),
        }
    }
}

/// Routes invocations from both ingress paths to handlers.
pub struct Dispatcher {
    registry: CommandRegistry,
    context: CommandContext,
    help: String,
    command_stages: InterceptorChain,
    button_stages: InterceptorChain,
}

impl Dispatcher {
    /// Dispatcher with the given limiters for typed commands and buttons.
    ///
    /// Both ingress paths share one authorization gate for the configured
    /// operator.
    #[must_use]
    pub fn new(
        registry: CommandRegistry,
        context: CommandContext,
        command_limiter: RateLimiter,
        button_limiter: RateLimiter,
    ) -> Self {
        let gate = Arc::new(AuthorizationGate::new(Identity(
            context.settings.allowed_user_id,
        )));

        let mut command_stages = InterceptorChain::new();
        command_stages.register(Box::new(AuthorizationStage::new(Arc::clone(&gate))));
        command_stages.register(Box::new(CooldownStage::new("command_cooldown", command_limiter)));

        let mut button_stages = InterceptorChain::new();
        button_stages.register(Box::new(AuthorizationStage::new(gate)));
        button_stages.register(Box::new(CooldownStage::new("button_cooldown", button_limiter)));

        let help = registry.help_text();
        Self {
            registry,
            context,
            help,
            command_stages,
            button_stages,
        }
    }

    /// Dispatcher with every built-in command and the configured cooldowns.
    #[must_use]
    pub fn from_context(context: CommandContext) -> Self {
        let command_limiter = context
            .settings
            .command_cooldowns()
            .into_iter()
            .fold(RateLimiter::new(), |limiter, (key, cooldown)| {
                limiter.with_cooldown(key, cooldown)
            });
        let button_limiter = RateLimiter::uniform(context.settings.panel_cooldown());
        Self::new(
            CommandRegistry::with_default_handlers(),
            context,
            command_limiter,
            button_limiter,
        )
    }

    /// Shared handler context.
    #[must_use]
    pub const fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Registered commands.
    #[must_use]
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Dispatch a typed command or plain text.
    pub async fn dispatch(&self, invocation: Invocation, reply: &dyn ReplyChannel) -> Outcome {
        debug!(
            command = %invocation.command,
            args = invocation.args.len(),
            user = ?invocation.sender,
            "Received invocation"
        );

        let handler = self.registry.get(&invocation.command);
        let cooldown_key = handler
            .as_ref()
            .and_then(|h| h.cooldown_key(&invocation.args));

        let outcome = match self.command_stages.run(&StageContext {
            invocation: &invocation,
            cooldown_key,
        }) {
            Verdict::Deny => Outcome::Denied,
            Verdict::Throttle { remaining_secs } => Outcome::Throttled { remaining_secs },
            Verdict::Continue => match handler {
                Some(handler) => self.execute(handler.as_ref(), &invocation.args, reply).await,
                None => self.unknown_command(&invocation.command, reply).await,
            },
        };
        self.finish(&invocation, outcome, reply).await
    }

    /// Dispatch a panel button press.
    pub async fn dispatch_button(
        &self,
        button_id: &str,
        sender: Option<Identity>,
        reply: &dyn ReplyChannel,
    ) -> Outcome {
        let invocation = Invocation {
            command: button_id.to_string(),
            args: Vec::new(),
            sender,
            ingress: Ingress::Button,
        };
        debug!(button = button_id, user = ?sender, "Received button press");

        let action = ButtonAction::from_id(button_id);
        let outcome = match self.button_stages.run(&StageContext {
            invocation: &invocation,
            cooldown_key: action.map(ButtonAction::id),
        }) {
            Verdict::Deny => Outcome::Denied,
            Verdict::Throttle { remaining_secs } => Outcome::Throttled { remaining_secs },
            Verdict::Continue => match action {
                None => Outcome::Failed(CommandError::InvalidArgument(format!(
                    "Unknown button: {button_id}"
                ))),
                Some(action) => {
                    let (name, args) = action.command();
                    match self.registry.get(name) {
                        Some(handler) => self.execute(handler.as_ref(), &args, reply).await,
                        None => Outcome::Failed(CommandError::InvalidArgument(format!(
                            "Button {button_id} has no handler"
                        ))),
                    }
                }
            },
        };
        self.finish(&invocation, outcome, reply).await
    }

    async fn execute(
        &self,
        handler: &dyn CommandHandler,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Outcome {
        debug!(command = handler.name(), "Executing");
        match handler.handle(&self.context, args, reply).await {
            Ok(()) => Outcome::Replied,
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn unknown_command(&self, name: &str, reply: &dyn ReplyChannel) -> Outcome {
        info!(command = name, "Unknown command");
        let text = format!("Unknown command: /{name}\n\n{}", self.help);
        match reply.send_text(&text).await {
            Ok(()) => Outcome::Replied,
            Err(e) => Outcome::Failed(CommandError::Transport(e)),
        }
    }

    async fn finish(
        &self,
        invocation: &Invocation,
        outcome: Outcome,
        reply: &dyn ReplyChannel,
    ) -> Outcome {
        match &outcome {
            Outcome::Replied => {
                debug!(command = %invocation.command, ingress = ?invocation.ingress, "Replied");
            }
            Outcome::Denied | Outcome::Throttled { .. } => {}
            Outcome::Failed(e) if e.is_user_error() => {
                debug!(command = %invocation.command, error = %e, "Invocation rejected");
            }
            Outcome::Failed(e) => {
                error!(command = %invocation.command, ingress = ?invocation.ingress, error = %e, "Invocation failed");
            }
        }

        if let Some(notice) = outcome.notice() {
            if let Err(e) = reply.send_notice(&notice).await {
                warn!(command = %invocation.command, error = %e, "Failed to deliver notice");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSettings;
    use crate::testing::{MockDesktop, RecordingReply, Sent};
    use std::time::Duration;

    const OPERATOR: i64 = 4242;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            allowed_user_id: OPERATOR,
            ..ControllerSettings::default()
        }
    }

    fn dispatcher(desktop: MockDesktop, dir: &std::path::Path) -> Dispatcher {
        Dispatcher::from_context(desktop.into_context(settings(), dir))
    }

    fn cmd(name: &str, args: &[&str], sender: Option<i64>) -> Invocation {
        Invocation::new(
            name,
            args.iter().map(ToString::to_string).collect(),
            sender.map(Identity),
        )
    }

    #[test]
    fn test_from_text_parses_commands() {
        let inv = Invocation::from_text("/Git@deskbot log -5", Some(Identity(1))).expect("inv");
        assert_eq!(inv.command, "git");
        assert_eq!(inv.args, vec!["log", "-5"]);
        assert_eq!(inv.ingress, Ingress::Command);

        let text = Invocation::from_text("echo  hi ", None).expect("text");
        assert_eq!(text.command, "text");
        assert_eq!(text.args, vec!["echo  hi "]);

        assert!(Invocation::from_text("   ", None).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strangers_are_denied_everywhere() {
        let dir = tempfile::tempdir().expect("tempdir");
        // Mocks without expectations panic if any handler reaches them.
        let dispatcher = dispatcher(MockDesktop::default(), dir.path());
        let names = [
            "start", "help", "panel", "status", "screen", "window", "crop", "key", "type",
            "click", "focus", "text", "sh", "git", "build", "apk", "file", "claude", "nope",
        ];

        for sender in [None, Some(1), Some(-OPERATOR)] {
            for name in &names {
                let reply = RecordingReply::new();
                let outcome = dispatcher.dispatch(cmd(name, &["x"], sender), &reply).await;
                assert!(matches!(outcome, Outcome::Denied), "/{name} from {sender:?}");
                assert_eq!(reply.sent(), vec![Sent::Notice("Unauthorized.".to_string())]);
            }
            for action in ButtonAction::ALL {
                let reply = RecordingReply::new();
                let outcome = dispatcher
                    .dispatch_button(action.id(), sender.map(Identity), &reply)
                    .await;
                assert!(matches!(outcome, Outcome::Denied));
                assert_eq!(reply.sent(), vec![Sent::Notice("Unauthorized.".to_string())]);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_command_replies_with_help() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dispatcher = dispatcher(MockDesktop::default(), dir.path());
        let reply = RecordingReply::new();

        let outcome = dispatcher
            .dispatch(cmd("reboot", &[], Some(OPERATOR)), &reply)
            .await;
        assert!(matches!(outcome, Outcome::Replied));
        let texts = reply.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Unknown command: /reboot"));
        assert!(texts[0].contains("/screen"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_cooldown_is_shared_and_expires() {
        let mut desktop = MockDesktop::default();
        desktop.screen.expect_capture().times(2).returning(|_| Ok(vec![7]));
        let dir = tempfile::tempdir().expect("tempdir");
        let dispatcher = dispatcher(desktop, dir.path());
        let reply = RecordingReply::new();

        let first = dispatcher.dispatch(cmd("screen", &[], Some(OPERATOR)), &reply).await;
        assert!(matches!(first, Outcome::Replied));

        let second = dispatcher.dispatch(cmd("window", &[], Some(OPERATOR)), &reply).await;
        assert!(matches!(second, Outcome::Throttled { remaining_secs: 2 }));

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = dispatcher.dispatch(cmd("screen", &[], Some(OPERATOR)), &reply).await;
        assert!(matches!(third, Outcome::Replied));

        assert_eq!(
            reply.sent(),
            vec![
                Sent::Photo(vec![7]),
                Sent::Notice("Cooldown: wait 2s.".to_string()),
                Sent::Photo(vec![7]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_pool_is_independent() {
        let mut desktop = MockDesktop::default();
        desktop.screen.expect_capture().times(2).returning(|_| Ok(vec![1]));
        let dir = tempfile::tempdir().expect("tempdir");
        let dispatcher = dispatcher(desktop, dir.path());
        let reply = RecordingReply::new();

        let typed = dispatcher.dispatch(cmd("screen", &[], Some(OPERATOR)), &reply).await;
        let pressed = dispatcher
            .dispatch_button("screen", Some(Identity(OPERATOR)), &reply)
            .await;
        let again = dispatcher
            .dispatch_button("screen", Some(Identity(OPERATOR)), &reply)
            .await;

        assert!(matches!(typed, Outcome::Replied));
        assert!(matches!(pressed, Outcome::Replied));
        assert!(matches!(again, Outcome::Throttled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_button_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dispatcher = dispatcher(MockDesktop::default(), dir.path());
        let reply = RecordingReply::new();

        let outcome = dispatcher
            .dispatch_button("self_destruct", Some(Identity(OPERATOR)), &reply)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failed(CommandError::InvalidArgument(_))
        ));
        assert_eq!(
            reply.notices(),
            vec!["Unknown button: self_destruct".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_failure_sends_one_notice() {
        let mut desktop = MockDesktop::default();
        desktop
            .input
            .expect_click()
            .returning(|_, _| Err(anyhow::anyhow!("no display")));
        let dir = tempfile::tempdir().expect("tempdir");
        let dispatcher = dispatcher(desktop, dir.path());
        let reply = RecordingReply::new();

        let outcome = dispatcher
            .dispatch(cmd("click", &["1", "2"], Some(OPERATOR)), &reply)
            .await;
        assert!(matches!(outcome, Outcome::Failed(CommandError::Collaborator(_))));
        assert_eq!(
            reply.sent(),
            vec![Sent::Notice("Desktop operation failed: no display".to_string())]
        );
    }
}
