//! Process-lifetime session state.
//!
//! Holds the working directory used by version-control commands and the
//! optional crop region used by screen capture. Nothing here is persisted.

use crate::collaborators::WindowInspector;
use crate::error::CommandError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Screen rectangle in absolute desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl CropRegion {
    /// Whether both dimensions are positive.
    #[must_use]
    pub const fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Parse `x y w h` arguments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless there are exactly four integers with a
    /// positive width and height.
    pub fn from_args(args: &[String]) -> Result<Self, CommandError> {
        let usage = || CommandError::InvalidArgument("Region must be: <x> <y> <w> <h>".to_string());
        let [left, top, width, height] = args else {
            return Err(usage());
        };
        let parse = |s: &String| s.parse::<i32>().map_err(|_| usage());
        let region = Self {
            left: parse(left)?,
            top: parse(top)?,
            width: parse(width)?,
            height: parse(height)?,
        };
        if !region.has_area() {
            return Err(CommandError::InvalidArgument(
                "Width and height must be positive.".to_string(),
            ));
        }
        Ok(region)
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Requested change to the crop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropRequest {
    /// Use these coordinates.
    Explicit(CropRegion),
    /// Use the bounds of the currently focused window.
    ActiveWindow,
    /// Capture the full primary display again.
    Clear,
}

/// Mutable state shared by every invocation.
#[derive(Debug)]
pub struct SessionState {
    working_dir: RwLock<PathBuf>,
    crop_region: RwLock<Option<CropRegion>>,
}

impl SessionState {
    /// Create session state with the startup working directory.
    ///
    /// The directory is made absolute but not validated; a bad default only
    /// surfaces when a command runs in it.
    #[must_use]
    pub fn new(initial_working_dir: impl AsRef<Path>) -> Self {
        let dir = initial_working_dir.as_ref();
        let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        Self {
            working_dir: RwLock::new(dir),
            crop_region: RwLock::new(None),
        }
    }

    /// Current working directory for version-control commands.
    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch the working directory.
    ///
    /// # Errors
    ///
    /// Returns `StateValidationFailed` if `candidate` is not an existing
    /// directory; the previous value is kept.
    pub fn set_working_dir(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, CommandError> {
        let candidate = candidate.as_ref();
        if !candidate.is_dir() {
            return Err(CommandError::StateValidationFailed(format!(
                "Not a directory: {}",
                candidate.display()
            )));
        }
        let absolute = std::path::absolute(candidate).map_err(|e| {
            CommandError::StateValidationFailed(format!("{}: {e}", candidate.display()))
        })?;

        *self
            .working_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = absolute.clone();
        info!(dir = %absolute.display(), "Working directory changed");
        Ok(absolute)
    }

    /// Current crop region; `None` means the full primary display.
    #[must_use]
    pub fn crop_region(&self) -> Option<CropRegion> {
        *self
            .crop_region
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve and commit a crop request.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an explicit region without area;
    /// `StateValidationFailed` when no usable window is focused;
    /// `Collaborator` when the window inspector fails.
    pub async fn set_crop_region(
        &self,
        request: CropRequest,
        windows: &dyn WindowInspector,
    ) -> Result<Option<CropRegion>, CommandError> {
        let resolved = match request {
            CropRequest::Explicit(region) => {
                if !region.has_area() {
                    return Err(CommandError::InvalidArgument(
                        "Width and height must be positive.".to_string(),
                    ));
                }
                Some(region)
            }
            CropRequest::ActiveWindow => Some(active_window_region(windows).await?),
            CropRequest::Clear => None,
        };

        *self
            .crop_region
            .write()
            .unwrap_or_else(PoisonError::into_inner) = resolved;
        debug!(crop = ?resolved, "Crop region updated");
        Ok(resolved)
    }
}

/// Bounds of the focused window, validated to have an area.
///
/// # Errors
///
/// `StateValidationFailed` if no window is focused or its bounds are
/// non-positive; `Collaborator` if the inspector fails.
pub async fn active_window_region(
    windows: &dyn WindowInspector,
) -> Result<CropRegion, CommandError> {
    let window = windows
        .active_window()
        .await
        .map_err(CommandError::Collaborator)?
        .ok_or_else(|| CommandError::StateValidationFailed("No active window detected.".to_string()))?;

    if !window.region.has_area() {
        return Err(CommandError::StateValidationFailed(
            "Active window has invalid dimensions.".to_string(),
        ));
    }
    debug!(title = %window.title, region = %window.region, "Active window");
    Ok(window.region)
}
