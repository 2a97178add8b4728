//! Contracts for the desktop collaborators.
//!
//! The controller never touches pixels or input devices itself; it asks these
//! traits. Implementations live with the binary.

use crate::session::CropRegion;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Focused window as reported by the window inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Window title.
    pub title: String,
    /// Window bounds.
    pub region: CropRegion,
}

/// Symbolic key or key combination, e.g. `ctrl+c`, `enter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    keys: Vec<String>,
}

impl KeyCombo {
    /// Parse `ctrl+shift+t` style text (case-insensitive, `+` separated).
    ///
    /// Returns `None` if any part is empty.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let keys: Vec<String> = text
            .trim()
            .to_lowercase()
            .split('+')
            .map(|k| k.trim().to_string())
            .collect();
        if keys.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { keys })
    }

    /// A single named key.
    #[must_use]
    pub fn single(key: &str) -> Self {
        Self {
            keys: vec![key.to_lowercase()],
        }
    }

    /// Individual key names in press order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Whether more than one key is held together.
    #[must_use]
    pub fn is_combo(&self) -> bool {
        self.keys.len() > 1
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("+"))
    }
}

/// Produces an encoded image of the screen.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Capture `region`, or the full primary display when `None`.
    /// Returns JPEG bytes.
    async fn capture(&self, region: Option<CropRegion>) -> Result<Vec<u8>>;
}

/// Inspects and focuses desktop windows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowInspector: Send + Sync {
    /// The focused window, or `None` if nothing is focused.
    async fn active_window(&self) -> Result<Option<WindowInfo>>;

    /// Focus the first window whose title contains `title`.
    /// Returns the focused window's full title, or `None` if nothing matched.
    async fn focus(&self, title: &str) -> Result<Option<String>>;
}

/// Simulates keyboard and mouse input.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputSimulator: Send + Sync {
    /// Type literal text into the focused window.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key or combination `repeat` times.
    async fn press(&self, combo: &KeyCombo, repeat: u32) -> Result<()>;

    /// Left-click at absolute coordinates.
    async fn click(&self, x: i32, y: i32) -> Result<()>;
}
