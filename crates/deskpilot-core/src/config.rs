//! Configuration and settings management
//!
//! Loads controller settings from config files and environment variables and
//! defines the default budgets (cooldowns, timeouts, size limits).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application version reported by `/status` and `/help`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cooldown between screen captures (`/screen`, `/window`).
pub const CAPTURE_COOLDOWN_SECS: f64 = 2.0;
/// Cooldown between version-control invocations.
pub const GIT_COOLDOWN_SECS: f64 = 3.0;
/// Cooldown between builds.
pub const BUILD_COOLDOWN_SECS: f64 = 60.0;
/// Cooldown between APK lookups.
pub const APK_COOLDOWN_SECS: f64 = 3.0;
/// Cooldown between file downloads.
pub const FILE_COOLDOWN_SECS: f64 = 3.0;
/// Cooldown between free-form shell commands.
pub const SHELL_COOLDOWN_SECS: f64 = 2.0;
/// Cooldown between `claude` prompts.
pub const CLAUDE_COOLDOWN_SECS: f64 = 10.0;
/// Cooldown between input simulation commands (per command).
pub const INPUT_COOLDOWN_SECS: f64 = 1.0;
/// Cooldown between presses of the same panel button.
pub const PANEL_COOLDOWN_SECS: f64 = 2.0;

/// Timeout for free-form shell commands.
pub const SHELL_TIMEOUT_SECS: u64 = 60;
/// Timeout for version-control commands.
pub const GIT_TIMEOUT_SECS: u64 = 60;
/// Timeout for the gradle build.
pub const BUILD_TIMEOUT_SECS: u64 = 300;
/// Timeout for `claude -p`.
pub const CLAUDE_TIMEOUT_SECS: u64 = 120;
/// Timeout for desktop helper tools (capture, xdotool).
pub const DESKTOP_TIMEOUT_SECS: u64 = 10;

/// Largest file the transport accepts as a document (50 MiB).
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
/// Texts longer than `limit * ATTACHMENT_MULTIPLE` are sent as a file.
pub const ATTACHMENT_MULTIPLE: usize = 3;
/// Budget for a single diagnostic message.
pub const DIAGNOSTIC_MESSAGE_BUDGET: usize = 4000;
/// Budget for the tail of a failed build's stderr.
pub const BUILD_FAILURE_TAIL_CHARS: usize = 1500;
/// Upper bound for `/key <combo> N`.
pub const MAX_KEY_REPEAT: u32 = 200;

/// Build the layered configuration source shared by all settings structs.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed environment, plain environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE maps to snake_case; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Controller settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ControllerSettings {
    /// The single Telegram user allowed to operate the bot (0 disables everyone).
    pub allowed_user_id: i64,
    /// Initial working directory for `/git`.
    pub git_dir: Option<PathBuf>,
    /// Gradle project directory for `/build`.
    pub project_dir: Option<PathBuf>,
    /// Comma-separated list of directories searched for APKs.
    #[serde(rename = "apk_search_dirs")]
    pub apk_search_dirs_str: Option<String>,
    /// Glob (relative to each search dir) matching APK files.
    pub apk_glob: String,
    /// Gradle wrapper file name inside the project directory.
    pub build_wrapper: String,
    /// Gradle task run by `/build`.
    pub build_task: String,
    /// Largest file sent by `/file` and `/apk`, in bytes.
    pub max_file_size: u64,
    /// JPEG quality for screenshots.
    pub screenshot_quality: u8,
    /// See [`ATTACHMENT_MULTIPLE`].
    pub attachment_multiple: usize,

    /// Capture cooldown in seconds.
    pub capture_cooldown_secs: f64,
    /// Git cooldown in seconds.
    pub git_cooldown_secs: f64,
    /// Build cooldown in seconds.
    pub build_cooldown_secs: f64,
    /// APK lookup cooldown in seconds.
    pub apk_cooldown_secs: f64,
    /// File download cooldown in seconds.
    pub file_cooldown_secs: f64,
    /// Shell cooldown in seconds.
    pub shell_cooldown_secs: f64,
    /// Claude cooldown in seconds.
    pub claude_cooldown_secs: f64,
    /// Input simulation cooldown in seconds.
    pub input_cooldown_secs: f64,
    /// Panel button cooldown in seconds.
    pub panel_cooldown_secs: f64,

    /// Shell timeout in seconds.
    pub shell_timeout_secs: u64,
    /// Git timeout in seconds.
    pub git_timeout_secs: u64,
    /// Build timeout in seconds.
    pub build_timeout_secs: u64,
    /// Claude timeout in seconds.
    pub claude_timeout_secs: u64,
    /// Desktop helper timeout in seconds.
    pub desktop_timeout_secs: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            allowed_user_id: 0,
            git_dir: None,
            project_dir: None,
            apk_search_dirs_str: None,
            apk_glob: "**/*.apk".to_string(),
            build_wrapper: default_build_wrapper().to_string(),
            build_task: "assembleDebug".to_string(),
            max_file_size: MAX_FILE_SIZE,
            screenshot_quality: 70,
            attachment_multiple: ATTACHMENT_MULTIPLE,
            capture_cooldown_secs: CAPTURE_COOLDOWN_SECS,
            git_cooldown_secs: GIT_COOLDOWN_SECS,
            build_cooldown_secs: BUILD_COOLDOWN_SECS,
            apk_cooldown_secs: APK_COOLDOWN_SECS,
            file_cooldown_secs: FILE_COOLDOWN_SECS,
            shell_cooldown_secs: SHELL_COOLDOWN_SECS,
            claude_cooldown_secs: CLAUDE_COOLDOWN_SECS,
            input_cooldown_secs: INPUT_COOLDOWN_SECS,
            panel_cooldown_secs: PANEL_COOLDOWN_SECS,
            shell_timeout_secs: SHELL_TIMEOUT_SECS,
            git_timeout_secs: GIT_TIMEOUT_SECS,
            build_timeout_secs: BUILD_TIMEOUT_SECS,
            claude_timeout_secs: CLAUDE_TIMEOUT_SECS,
            desktop_timeout_secs: DESKTOP_TIMEOUT_SECS,
        }
    }
}

const fn default_build_wrapper() -> &'static str {
    if cfg!(windows) {
        "gradlew.bat"
    } else {
        "gradlew"
    }
}

impl ControllerSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Initial `/git` working directory, falling back to the process cwd.
    #[must_use]
    pub fn initial_git_dir(&self) -> PathBuf {
        self.git_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directories searched by `/apk`.
    ///
    /// Falls back to the project directory when no search dirs are set.
    #[must_use]
    pub fn apk_search_dirs(&self) -> Vec<PathBuf> {
        let dirs: Vec<PathBuf> = self
            .apk_search_dirs_str
            .as_ref()
            .map(|s| {
                s.split([',', ';'])
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        if dirs.is_empty() {
            self.project_dir.iter().cloned().collect()
        } else {
            dirs
        }
    }

    /// Cooldown per primary-ingress key.
    #[must_use]
    pub fn command_cooldowns(&self) -> Vec<(&'static str, Duration)> {
        use crate::commands::keys;

        let input = secs(self.input_cooldown_secs);
        vec![
            (keys::CAPTURE, secs(self.capture_cooldown_secs)),
            (keys::GIT, secs(self.git_cooldown_secs)),
            (keys::BUILD, secs(self.build_cooldown_secs)),
            (keys::APK, secs(self.apk_cooldown_secs)),
            (keys::FILE, secs(self.file_cooldown_secs)),
            (keys::SHELL, secs(self.shell_cooldown_secs)),
            (keys::CLAUDE, secs(self.claude_cooldown_secs)),
            (keys::KEY, input),
            (keys::TYPE, input),
            (keys::CLICK, input),
            (keys::FOCUS, input),
            (keys::TEXT, input),
        ]
    }

    /// Cooldown applied to every panel button.
    #[must_use]
    pub fn panel_cooldown(&self) -> Duration {
        secs(self.panel_cooldown_secs)
    }
}

/// Negative or non-finite values disable the cooldown.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
