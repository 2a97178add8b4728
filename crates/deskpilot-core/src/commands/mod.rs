//! Command handlers and their registry.
//!
//! Each handler implements [`CommandHandler`] and is registered under its
//! command name. Handlers only run after the dispatcher's interceptor stages
//! have admitted the invocation.

mod build;
mod general;
mod git;
mod input;
mod screen;
mod shell;

pub use build::{find_apks, ApkCommand, ApkFile, BuildCommand, FileCommand};
pub use general::{HelpCommand, PanelCommand, StartCommand, StatusCommand};
pub use git::{git_args_with_defaults, GitCommand};
pub use input::{ClickCommand, FocusCommand, KeyCommand, TextCommand, TypeCommand};
pub use screen::{CropCommand, ScreenCommand, WindowCommand};
pub use shell::{ClaudeCommand, ShellCommand};

use crate::collaborators::{InputSimulator, ScreenCapture, WindowInspector};
use crate::config::{ControllerSettings, VERSION};
use crate::error::CommandError;
use crate::process::{ProcessError, ProcessOutput, ProcessRunner};
use crate::reply::ReplyChannel;
use crate::session::SessionState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Cooldown keys for the primary ingress.
pub mod keys {
    /// Shared by `/screen` and `/window`.
    pub const CAPTURE: &str = "capture";
    /// `/git` (not `/git cd`).
    pub const GIT: &str = "git";
    /// `/build`.
    pub const BUILD: &str = "build";
    /// `/apk`.
    pub const APK: &str = "apk";
    /// `/file`.
    pub const FILE: &str = "file";
    /// `/sh`.
    pub const SHELL: &str = "sh";
    /// `/claude`.
    pub const CLAUDE: &str = "claude";
    /// `/key`.
    pub const KEY: &str = "key";
    /// `/type`.
    pub const TYPE: &str = "type";
    /// `/click`.
    pub const CLICK: &str = "click";
    /// `/focus`.
    pub const FOCUS: &str = "focus";
    /// Plain text typing.
    pub const TEXT: &str = "text";
}

/// Everything a handler may use.
#[derive(Clone)]
pub struct CommandContext {
    /// Working directory and crop region.
    pub session: Arc<SessionState>,
    /// External process runner.
    pub runner: ProcessRunner,
    /// Screen capture collaborator.
    pub screen: Arc<dyn ScreenCapture>,
    /// Window inspection collaborator.
    pub windows: Arc<dyn WindowInspector>,
    /// Input simulation collaborator.
    pub input: Arc<dyn InputSimulator>,
    /// Controller settings.
    pub settings: Arc<ControllerSettings>,
    /// Process start, for `/status`.
    pub started_at: Instant,
}

impl CommandContext {
    /// Fresh session state for the given desktop collaborators.
    ///
    /// The git working dir starts at [`ControllerSettings::initial_git_dir`].
    #[must_use]
    pub fn new(
        settings: Arc<ControllerSettings>,
        screen: Arc<dyn ScreenCapture>,
        windows: Arc<dyn WindowInspector>,
        input: Arc<dyn InputSimulator>,
    ) -> Self {
        Self {
            session: Arc::new(SessionState::new(settings.initial_git_dir())),
            runner: ProcessRunner::new(),
            screen,
            windows,
            input,
            settings,
            started_at: Instant::now(),
        }
    }
}

/// A named command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name without the leading slash.
    fn name(&self) -> &'static str;

    /// One help line, e.g. `/git [args] — run git in the working dir`.
    fn usage(&self) -> &'static str;

    /// Rate-limit bucket for this call, or `None` for no cooldown.
    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        None
    }

    /// Run the command and reply.
    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError>;
}

/// Handlers by command name, in registration order.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in command.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ScreenCommand));
        registry.register(Arc::new(WindowCommand));
        registry.register(Arc::new(CropCommand));
        registry.register(Arc::new(KeyCommand));
        registry.register(Arc::new(TypeCommand));
        registry.register(Arc::new(ClickCommand));
        registry.register(Arc::new(FocusCommand));
        registry.register(Arc::new(TextCommand));
        registry.register(Arc::new(GitCommand));
        registry.register(Arc::new(BuildCommand));
        registry.register(Arc::new(ApkCommand));
        registry.register(Arc::new(FileCommand));
        registry.register(Arc::new(ShellCommand));
        registry.register(Arc::new(ClaudeCommand));
        registry.register(Arc::new(PanelCommand));
        registry.register(Arc::new(StatusCommand));

        let help = registry.help_text();
        registry.register(Arc::new(StartCommand::new(help.clone())));
        registry.register(Arc::new(HelpCommand::new(help)));
        registry
    }

    /// Register a handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.name();
        info!(command = name, "Registered command");
        if self.handlers.insert(name, handler).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a handler.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no command is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Help text listing every registered command except `/start`.
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut text = format!("Deskpilot v{VERSION}\n\nCommands:\n");
        for name in self.order.iter().filter(|n| !matches!(**n, "start" | "help")) {
            if let Some(handler) = self.handlers.get(name) {
                text.push_str(handler.usage());
                text.push('\n');
            }
        }
        text.push_str("/help — This message\n\nPlain text → typed + auto-screenshot");
        text
    }
}

/// Join arguments back into the text the operator typed.
pub(crate) fn joined(args: &[String]) -> String {
    args.join(" ").trim().to_string()
}

/// Output to show for an interactive tool run.
///
/// A nonzero exit still carries the tool's own report, so it is shown rather
/// than turned into an error.
pub(crate) fn reported_output(
    result: Result<ProcessOutput, ProcessError>,
) -> Result<String, ProcessError> {
    match result {
        Ok(output) => Ok(output.display_text()),
        Err(ProcessError::ExecutionFailed { output, .. }) => Ok(output),
        Err(e) => Err(e),
    }
}
