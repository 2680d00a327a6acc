//! Clipboard writing

use arboard::Clipboard;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to write clipboard: {0}")]
    Write(String),
}

/// Replaces the system clipboard contents with `text`. The OS pasteboard keeps the
/// contents after the `Clipboard` handle is dropped.
/// Logs only length to avoid leaking recognized content into logs.
pub fn set_clipboard_text(text: &str) -> Result<(), ClipboardError> {
    let mut clipboard =
        Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| ClipboardError::Write(e.to_string()))?;

    debug!(len = text.len(), "Clipboard updated");
    Ok(())
}
