//! Inline button panel vocabulary.
//!
//! Every button maps onto an ordinary command invocation, so the panel runs
//! exactly the same handler logic as typed commands.

/// Prefix of the callback data attached to panel buttons.
pub const CALLBACK_PREFIX: &str = "p:";

/// A panel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    /// Full screenshot.
    Screen,
    /// Active window screenshot.
    Window,
    /// `git status`.
    GitStatus,
    /// Compact `git log`.
    GitLog,
    /// `git diff --stat`.
    GitDiff,
    /// Debug build.
    Build,
    /// Debug build, then send the APK.
    BuildApk,
    /// Newest APK.
    Apk,
    /// Bot status.
    Status,
    /// Enter key.
    KeyEnter,
    /// Escape key.
    KeyEsc,
    /// Ctrl+C.
    KeyCtrlC,
    /// Tab key.
    KeyTab,
    /// Shift+Tab.
    KeyShiftTab,
    /// Backspace thirty times.
    KeyBackspace30,
    /// Types `let's finish`.
    TypeFinish,
}

/// Button rows as shown to the operator.
pub const LAYOUT: &[&[ButtonAction]] = &[
    &[ButtonAction::Screen, ButtonAction::Window],
    &[
        ButtonAction::GitStatus,
        ButtonAction::GitLog,
        ButtonAction::GitDiff,
    ],
    &[
        ButtonAction::Build,
        ButtonAction::BuildApk,
        ButtonAction::Apk,
        ButtonAction::Status,
    ],
    &[
        ButtonAction::KeyEnter,
        ButtonAction::KeyEsc,
        ButtonAction::KeyCtrlC,
        ButtonAction::KeyTab,
    ],
    &[
        ButtonAction::KeyShiftTab,
        ButtonAction::KeyBackspace30,
        ButtonAction::TypeFinish,
    ],
];

impl ButtonAction {
    /// Every button.
    pub const ALL: [Self; 16] = [
        Self::Screen,
        Self::Window,
        Self::GitStatus,
        Self::GitLog,
        Self::GitDiff,
        Self::Build,
        Self::BuildApk,
        Self::Apk,
        Self::Status,
        Self::KeyEnter,
        Self::KeyEsc,
        Self::KeyCtrlC,
        Self::KeyTab,
        Self::KeyShiftTab,
        Self::KeyBackspace30,
        Self::TypeFinish,
    ];

    /// Stable identifier; also the button's cooldown key.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Window => "window",
            Self::GitStatus => "git_status",
            Self::GitLog => "git_log",
            Self::GitDiff => "git_diff",
            Self::Build => "build",
            Self::BuildApk => "build_apk",
            Self::Apk => "apk",
            Self::Status => "status",
            Self::KeyEnter => "key_enter",
            Self::KeyEsc => "key_esc",
            Self::KeyCtrlC => "key_ctrlc",
            Self::KeyTab => "key_tab",
            Self::KeyShiftTab => "key_shifttab",
            Self::KeyBackspace30 => "key_bksp30",
            Self::TypeFinish => "type_finish",
        }
    }

    /// Button caption.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Screen => "Screen",
            Self::Window => "Window",
            Self::GitStatus => "Git Status",
            Self::GitLog => "Git Log",
            Self::GitDiff => "Git Diff",
            Self::Build => "Build",
            Self::BuildApk => "Build APK",
            Self::Apk => "APK",
            Self::Status => "Status",
            Self::KeyEnter => "Enter",
            Self::KeyEsc => "Esc",
            Self::KeyCtrlC => "Ctrl+C",
            Self::KeyTab => "Tab",
            Self::KeyShiftTab => "Shift+Tab",
            Self::KeyBackspace30 => "Bksp×30",
            Self::TypeFinish => "Let's finish",
        }
    }

    /// Look up a button by id.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }

    /// Callback data carried by the button.
    #[must_use]
    pub fn callback_data(self) -> String {
        format!("{CALLBACK_PREFIX}{}", self.id())
    }

    /// Command name and arguments this button runs.
    #[must_use]
    pub fn command(self) -> (&'static str, Vec<String>) {
        let (name, args): (&'static str, &[&str]) = match self {
            Self::Screen => ("screen", &[]),
            Self::Window => ("window", &[]),
            Self::GitStatus => ("git", &["status"]),
            Self::GitLog => ("git", &["log"]),
            Self::GitDiff => ("git", &["diff"]),
            Self::Build => ("build", &[]),
            Self::BuildApk => ("build", &["apk"]),
            Self::Apk => ("apk", &[]),
            Self::Status => ("status", &[]),
            Self::KeyEnter => ("key", &["enter"]),
            Self::KeyEsc => ("key", &["escape"]),
            Self::KeyCtrlC => ("key", &["ctrl+c"]),
            Self::KeyTab => ("key", &["tab"]),
            Self::KeyShiftTab => ("key", &["shift+tab"]),
            Self::KeyBackspace30 => ("key", &["backspace", "30"]),
            Self::TypeFinish => ("type", &["let's", "finish"]),
        };
        (name, args.iter().map(ToString::to_string).collect())
    }
}

/// Button id carried by callback data, if it is a panel callback.
#[must_use]
pub fn parse_callback_data(data: &str) -> Option<&str> {
    data.strip_prefix(CALLBACK_PREFIX)
}
