//! Interactive region capture

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "macos")]
pub use macos::capture_region;

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("Failed to create temporary file: {0}")]
    TempFile(std::io::Error),
    #[error("Failed to execute screen capture command: {0}")]
    CommandExecution(String),
    #[error("Screenshot capture not implemented for this platform")]
    Unsupported,
}

/// Outcome of one interactive capture.
///
/// `image_path` is only set when the user actually selected a region. The file belongs
/// to the pipeline run that produced it and is removed when the run finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub success: bool,
    pub image_path: Option<PathBuf>,
}

impl CaptureResult {
    pub fn captured(path: impl Into<PathBuf>) -> Self {
        Self {
            success: true,
            image_path: Some(path.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            image_path: None,
        }
    }

    /// Interprets the file the capture tool was asked to write.
    /// A missing or zero-byte file means the user backed out of the selection.
    pub fn from_output_file(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => Self::captured(path),
            _ => {
                let _ = std::fs::remove_file(path);
                Self::cancelled()
            }
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn capture_region() -> Result<CaptureResult, ScreenshotError> {
    Err(ScreenshotError::Unsupported)
}
