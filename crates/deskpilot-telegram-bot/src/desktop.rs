//! X11 desktop backend.
//!
//! Window inspection and input go through `xdotool`, screenshots through
//! ImageMagick `import`. Every call is an argv invocation on the shared
//! process runner with the desktop timeout.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use deskpilot_core::collaborators::{
    InputSimulator, KeyCombo, ScreenCapture, WindowInfo, WindowInspector,
};
use deskpilot_core::config::ControllerSettings;
use deskpilot_core::process::{
    Invocation, ProcessError, ProcessOutput, ProcessRequest, ProcessRunner,
};
use deskpilot_core::session::CropRegion;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Delay between typed characters.
const TYPE_DELAY_MS: u64 = 12;
/// Delay between repeated key presses.
const KEY_REPEAT_DELAY_MS: u64 = 20;

/// Desktop collaborators for an X11 session.
#[derive(Debug, Clone)]
pub struct X11Desktop {
    runner: ProcessRunner,
    timeout: Duration,
    quality: u8,
}

impl X11Desktop {
    /// Backend using the configured desktop timeout and JPEG quality.
    #[must_use]
    pub fn new(settings: &ControllerSettings) -> Self {
        Self {
            runner: ProcessRunner::new(),
            timeout: Duration::from_secs(settings.desktop_timeout_secs),
            quality: settings.screenshot_quality.clamp(1, 100),
        }
    }

    async fn exec(
        &self,
        program: &str,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.runner
            .run(ProcessRequest::new(Invocation::argv(program, args), timeout))
            .await
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<ProcessOutput> {
        self.exec(program, args, self.timeout)
            .await
            .map_err(|e| tool_error(program, e))
    }
}

fn tool_error(program: &str, err: ProcessError) -> anyhow::Error {
    match err {
        ProcessError::NotFound { .. } => anyhow!("{program} is not installed"),
        ProcessError::ExecutionFailed { exit_code, output } => {
            anyhow!("{program} exited with code {exit_code}: {}", output.trim())
        }
        other => anyhow!("{program} {other}"),
    }
}

fn strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

/// `import` arguments for a root-window capture written to `path`.
fn capture_args(region: Option<CropRegion>, quality: u8, path: &Path) -> Vec<String> {
    let mut args = strings(["-silent", "-window", "root"]);
    if let Some(r) = region {
        args.push("-crop".to_string());
        args.push(format!("{}x{}{:+}{:+}", r.width, r.height, r.left, r.top));
    }
    args.push("-quality".to_string());
    args.push(quality.to_string());
    args.push(path.display().to_string());
    args
}

/// Parse `xdotool getactivewindow getwindowname getwindowgeometry --shell`.
///
/// First line is the title, then `KEY=value` lines.
fn parse_window_report(stdout: &str) -> Option<WindowInfo> {
    let mut lines = stdout.lines();
    let title = lines.next()?.trim().to_string();
    let (mut left, mut top, mut width, mut height) = (None, None, None, None);
    for line in lines {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.parse::<i32>().ok();
        match key {
            "X" => left = value,
            "Y" => top = value,
            "WIDTH" => width = value,
            "HEIGHT" => height = value,
            _ => {}
        }
    }
    Some(WindowInfo {
        title,
        region: CropRegion {
            left: left?,
            top: top?,
            width: width?,
            height: height?,
        },
    })
}

/// X keysym for a symbolic key name.
fn keysym(name: &str) -> String {
    let sym = match name {
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" => "Insert",
        "space" => "space",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" | "pgup" => "Prior",
        "pagedown" | "pgdn" => "Next",
        "ctrl" | "control" => "ctrl",
        "win" | "super" | "cmd" | "meta" => "super",
        other => {
            if let Some(n) = other.strip_prefix('f').filter(|n| n.parse::<u8>().is_ok()) {
                return format!("F{n}");
            }
            other
        }
    };
    sym.to_string()
}

/// `ctrl+shift+t` in `xdotool key` syntax.
fn xdotool_combo(combo: &KeyCombo) -> String {
    combo
        .keys()
        .iter()
        .map(|k| keysym(k))
        .collect::<Vec<_>>()
        .join("+")
}

#[async_trait]
impl ScreenCapture for X11Desktop {
    async fn capture(&self, region: Option<CropRegion>) -> Result<Vec<u8>> {
        let file = tempfile::Builder::new()
            .prefix("deskpilot-")
            .suffix(".jpg")
            .tempfile()
            .context("Failed to create screenshot file")?;
        self.run("import", capture_args(region, self.quality, file.path()))
            .await?;

        let bytes = tokio::fs::read(file.path())
            .await
            .context("Failed to read screenshot")?;
        if bytes.is_empty() {
            bail!("import produced an empty screenshot");
        }
        debug!(bytes = bytes.len(), region = ?region, "Screenshot captured");
        Ok(bytes)
    }
}

#[async_trait]
impl WindowInspector for X11Desktop {
    async fn active_window(&self) -> Result<Option<WindowInfo>> {
        let args = strings([
            "getactivewindow",
            "getwindowname",
            "getwindowgeometry",
            "--shell",
        ]);
        match self.exec("xdotool", args, self.timeout).await {
            Ok(output) => Ok(parse_window_report(&output.stdout)),
            // No focused window.
            Err(ProcessError::ExecutionFailed { .. }) => Ok(None),
            Err(e) => Err(tool_error("xdotool", e)),
        }
    }

    async fn focus(&self, title: &str) -> Result<Option<String>> {
        let pattern = regex::escape(title);
        let search = strings(["search", "--onlyvisible", "--name", &pattern]);
        let found = match self.exec("xdotool", search, self.timeout).await {
            Ok(output) => output.stdout,
            Err(ProcessError::ExecutionFailed { .. }) => return Ok(None),
            Err(e) => return Err(tool_error("xdotool", e)),
        };
        let Some(window_id) = found.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Ok(None);
        };

        self.run("xdotool", strings(["windowactivate", "--sync", window_id]))
            .await?;
        let name = self
            .run("xdotool", strings(["getwindowname", window_id]))
            .await?;
        Ok(Some(name.stdout.trim().to_string()))
    }
}

#[async_trait]
impl InputSimulator for X11Desktop {
    async fn type_text(&self, text: &str) -> Result<()> {
        let delay = TYPE_DELAY_MS.to_string();
        let args = strings(["type", "--clearmodifiers", "--delay", &delay, "--", text]);
        // Typing speed is fixed, so long texts get a longer budget.
        let chars = u64::try_from(text.chars().count()).unwrap_or(u64::MAX);
        let budget = self.timeout + Duration::from_millis(TYPE_DELAY_MS.saturating_mul(chars));
        self.exec("xdotool", args, budget)
            .await
            .map_err(|e| tool_error("xdotool", e))?;
        Ok(())
    }

    async fn press(&self, combo: &KeyCombo, repeat: u32) -> Result<()> {
        let keys = xdotool_combo(combo);
        let repeat = repeat.max(1).to_string();
        let delay = KEY_REPEAT_DELAY_MS.to_string();
        let args = strings([
            "key",
            "--clearmodifiers",
            "--repeat",
            &repeat,
            "--delay",
            &delay,
            &keys,
        ]);
        self.run("xdotool", args).await?;
        Ok(())
    }

    async fn click(&self, x: i32, y: i32) -> Result<()> {
        let (x, y) = (x.to_string(), y.to_string());
        self.run(
            "xdotool",
            strings(["mousemove", "--sync", &x, &y, "click", "1"]),
        )
        .await?;
        Ok(())
    }
}
