//! Result delivery: clipboard and user notifications.
//!
//! Both side effects are fire-and-forget. Implementations log their own failures and
//! never report back, so the pipeline's decisions stay independent of the desktop.

use tracing::{debug, info, warn};

use crate::system;
use crate::system::ocr::OcrResult;

pub const NOTIFICATION_TITLE: &str = "Pine";
pub const MSG_TEXT_COPIED: &str = "Text Copied!";
pub const MSG_NETWORK_UNAVAILABLE: &str = "Was not able to connect to internet";
pub const MSG_CAPTURE_UNREADABLE: &str = "Could not read the captured image";

pub fn downloading_message(language: &str) -> String {
    format!("Downloading language data for {}", language)
}

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str);
}

/// What happened when the pipeline made sure the language model was available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFetchOutcome {
    AlreadyPresent,
    Downloaded,
    Failed,
}

impl ModelFetchOutcome {
    pub fn failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

pub struct SystemNotifier;

impl Notifier for SystemNotifier {
    fn notify(&self, title: &str, message: &str) {
        if let Err(e) = system::show_notification(title, message) {
            warn!(error = %e, message, "Failed to show notification");
        }
    }
}

pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&self, text: &str) {
        if let Err(e) = system::set_clipboard_text(text) {
            warn!(error = %e, "Failed to write clipboard");
        }
    }
}

pub struct ResultDelivery {
    notifier: Box<dyn Notifier>,
    clipboard: Box<dyn ClipboardWriter>,
}

impl ResultDelivery {
    pub fn new(notifier: Box<dyn Notifier>, clipboard: Box<dyn ClipboardWriter>) -> Self {
        Self {
            notifier,
            clipboard,
        }
    }

    fn notify(&self, message: &str) {
        self.notifier.notify(NOTIFICATION_TITLE, message);
    }

    pub fn announce_download(&self, language: &str) {
        self.notify(&downloading_message(language));
    }

    fn report_fetch(&self, fetch: ModelFetchOutcome) {
        if fetch.failed() {
            self.notify(MSG_NETWORK_UNAVAILABLE);
        }
    }

    /// Hands recognized text to the user. Returns whether the clipboard was written.
    ///
    /// Empty text is a silent no-op: no clipboard write and no success notification.
    pub fn deliver(&self, result: &OcrResult, fetch: ModelFetchOutcome) -> bool {
        self.report_fetch(fetch);

        if result.is_empty() {
            debug!("No text recognized, nothing to deliver");
            return false;
        }

        self.clipboard.write_text(&result.text);
        self.notify(MSG_TEXT_COPIED);
        info!(chars = result.text.len(), "Recognized text copied to clipboard");
        true
    }

    /// The capture could not be decoded; the run ends here.
    pub fn deliver_failure(&self, fetch: ModelFetchOutcome) {
        self.report_fetch(fetch);
        self.notify(MSG_CAPTURE_UNREADABLE);
    }
}
