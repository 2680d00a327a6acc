//! Desktop notifications
//!
//! macOS goes through `osascript`. Title and body are passed as process arguments, never
//! spliced into script text, so quotes in messages are harmless. Other platforms report
//! `NotifyError::Unsupported`.

use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to execute notifier: {0}")]
    CommandExecution(String),
    #[error("Notifications not implemented for this platform")]
    Unsupported,
}

#[cfg(target_os = "macos")]
fn notification_command(title: &str, message: &str) -> Option<Command> {
    let mut cmd = Command::new("osascript");
    cmd.arg("-e")
        .arg("on run argv")
        .arg("-e")
        .arg("display notification (item 2 of argv) with title (item 1 of argv)")
        .arg("-e")
        .arg("end run")
        .arg(title)
        .arg(message);
    Some(cmd)
}

#[cfg(not(target_os = "macos"))]
fn notification_command(_title: &str, _message: &str) -> Option<Command> {
    None
}

/// Shows a desktop notification. Returns once the notifier process exits; nothing is awaited
/// from the notification itself.
pub fn show_notification(title: &str, message: &str) -> Result<(), NotifyError> {
    let mut cmd = notification_command(title, message).ok_or(NotifyError::Unsupported)?;

    let output = cmd
        .output()
        .map_err(|e| NotifyError::CommandExecution(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NotifyError::CommandExecution(stderr.trim().to_string()));
    }

    debug!(title, message, "Notification shown");
    Ok(())
}
