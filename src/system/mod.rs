//! System interactions (screenshot, OCR engine, clipboard, notifications)

mod clipboard;
mod notification;
pub mod ocr;
mod screenshot;

pub use clipboard::{set_clipboard_text, ClipboardError};
pub use notification::{show_notification, NotifyError};
pub use screenshot::{capture_region, CaptureResult, ScreenshotError};
