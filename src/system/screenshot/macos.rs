//! macOS-specific region capture using the screencapture command

use std::process::Command;
use tracing::{debug, error, info};

use super::{CaptureResult, ScreenshotError};
use crate::paths;

fn screencapture_args() -> [&'static str; 5] {
    ["-i", "-s", "-x", "-t", "png"]
}

/// Lets the user drag out a screen region and writes it to a temp PNG.
///
/// Cancelling (Escape) leaves the file empty or absent, which comes back as
/// `CaptureResult::cancelled()` rather than an error. The caller owns the file on success.
pub fn capture_region() -> Result<CaptureResult, ScreenshotError> {
    debug!("Starting interactive screenshot region selection");

    let temp_dir = std::env::temp_dir();
    std::fs::create_dir_all(&temp_dir).map_err(ScreenshotError::TempFile)?;
    let temp_path = temp_dir.join(paths::timestamped_file_name("pine-screenshot", "png"));

    debug!(path = %temp_path.display(), "Screenshot will be saved to temp file");

    // -i: interactive, -s: mouse selection only, -x: no sounds, -t png: ignore the
    // user's screenshot format preference
    let output = Command::new("screencapture")
        .args(screencapture_args())
        .arg(&temp_path)
        .output()
        .map_err(|e| {
            ScreenshotError::CommandExecution(format!("Failed to execute screencapture: {}", e))
        })?;

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Exit code 1 is what Escape produces
        if exit_code == 1 && stderr.trim().is_empty() {
            debug!("User cancelled screenshot selection");
            let _ = std::fs::remove_file(&temp_path);
            return Ok(CaptureResult::cancelled());
        }

        let error_msg = if stderr.trim().is_empty() {
            format!("screencapture failed with exit code {}", exit_code)
        } else {
            format!("screencapture failed: {}", stderr.trim())
        };
        error!(error = %error_msg, "Screenshot capture failed");
        let _ = std::fs::remove_file(&temp_path);
        return Err(ScreenshotError::CommandExecution(error_msg));
    }

    let result = CaptureResult::from_output_file(&temp_path);
    if result.success {
        info!(path = %temp_path.display(), "Screenshot captured successfully");
    } else {
        debug!("Screenshot selection produced no image");
    }
    Ok(result)
}
