//! Capture-to-clipboard pipeline.
//!
//! One run walks `Idle → Capturing → EnsuringModel → Preprocessing → Recognizing →
//! Delivering → Idle`. Only one run may be in flight: a trigger arriving while the
//! controller is not idle is dropped, never queued. Every failure is absorbed here and
//! turned into at most one notification (or silence); nothing propagates to the host.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::delivery::{
    ClipboardWriter, ModelFetchOutcome, Notifier, ResultDelivery, SystemClipboard, SystemNotifier,
};
use crate::models::{LanguageModelProvider, ModelError};
use crate::preprocess::{self, ImageBuffer};
use crate::system::ocr::{OcrError, OcrResult, TesseractEngine};
use crate::system::{self, CaptureResult, ScreenshotError};

pub trait RegionCapture: Send + Sync {
    fn capture(&self) -> Result<CaptureResult, ScreenshotError>;
}

pub trait ModelStore: Send + Sync {
    fn is_present(&self, language: &str) -> bool;
    fn ensure(&self, language: &str) -> bool;
}

pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<OcrResult, OcrError>;
}

pub struct SystemCapture;

impl RegionCapture for SystemCapture {
    fn capture(&self) -> Result<CaptureResult, ScreenshotError> {
        system::capture_region()
    }
}

impl ModelStore for LanguageModelProvider {
    fn is_present(&self, language: &str) -> bool {
        LanguageModelProvider::is_present(self, language)
    }

    fn ensure(&self, language: &str) -> bool {
        LanguageModelProvider::ensure(self, language)
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<OcrResult, OcrError> {
        TesseractEngine::recognize(self, image, language)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Capturing,
    EnsuringModel,
    Preprocessing,
    Recognizing,
    Delivering,
}

/// How a call to [`PipelineController::run`] ended. Hosts are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run was in progress; this trigger had no effect.
    Ignored,
    /// The user backed out of the region selection.
    Cancelled,
    /// The capture tool itself could not run.
    CaptureFailed,
    /// The captured file was not a decodable image.
    LoadFailed,
    /// Recognition finished; `copied` is false when no text came back.
    Delivered { copied: bool },
}

/// The collaborators a pipeline run drives, in stage order.
pub struct PipelineStages {
    pub capture: Box<dyn RegionCapture>,
    pub models: Box<dyn ModelStore>,
    pub recognizer: Box<dyn TextRecognizer>,
    pub notifier: Box<dyn Notifier>,
    pub clipboard: Box<dyn ClipboardWriter>,
}

impl PipelineStages {
    /// Real desktop stages: screencapture, trained-data download, tesseract, OS clipboard.
    pub fn system(config: &PipelineConfig) -> Result<Self, ModelError> {
        Ok(Self {
            capture: Box::new(SystemCapture),
            models: Box::new(LanguageModelProvider::new(config)?),
            recognizer: Box::new(TesseractEngine::new(config)),
            notifier: Box::new(SystemNotifier),
            clipboard: Box::new(SystemClipboard),
        })
    }
}

/// Removes the capture file when the run ends, whatever the outcome.
struct CaptureFile(PathBuf);

impl CaptureFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for CaptureFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!(path = %self.0.display(), "Removed capture file"),
            Err(e) => warn!(error = %e, path = %self.0.display(), "Failed to remove capture file"),
        }
    }
}

/// Puts the controller back to `Idle` when a run ends, including by panic.
struct RunGuard<'a> {
    state: &'a Mutex<PipelineState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock_state(self.state) = PipelineState::Idle;
    }
}

fn lock_state(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct PipelineController {
    config: PipelineConfig,
    capture: Box<dyn RegionCapture>,
    models: Box<dyn ModelStore>,
    recognizer: Box<dyn TextRecognizer>,
    delivery: ResultDelivery,
    state: Mutex<PipelineState>,
}

impl PipelineController {
    pub fn new(config: PipelineConfig, stages: PipelineStages) -> Self {
        Self {
            config,
            capture: stages.capture,
            models: stages.models,
            recognizer: stages.recognizer,
            delivery: ResultDelivery::new(stages.notifier, stages.clipboard),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Controller wired to the real desktop facilities.
    pub fn with_system(config: PipelineConfig) -> Result<Self, ModelError> {
        let stages = PipelineStages::system(&config)?;
        Ok(Self::new(config, stages))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        *lock_state(&self.state)
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = lock_state(&self.state);
        debug!(from = ?*state, to = ?next, "Pipeline state change");
        *state = next;
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        let mut state = lock_state(&self.state);
        if *state != PipelineState::Idle {
            return None;
        }
        *state = PipelineState::Capturing;
        Some(RunGuard { state: &self.state })
    }

    /// Runs one capture → recognize → deliver pass. Blocks until the user has picked a
    /// region and recognition has finished, so hosts with a UI thread call it elsewhere.
    pub fn run(&self) -> RunOutcome {
        let Some(_guard) = self.try_begin() else {
            info!(state = ?self.state(), "Pipeline busy, ignoring trigger");
            return RunOutcome::Ignored;
        };

        let capture = match self.capture.capture() {
            Ok(capture) => capture,
            Err(e) => {
                warn!(error = %e, "Region capture failed");
                return RunOutcome::CaptureFailed;
            }
        };
        let Some(path) = capture.image_path.filter(|_| capture.success) else {
            debug!("Capture cancelled");
            return RunOutcome::Cancelled;
        };
        let capture_file = CaptureFile(path);

        self.set_state(PipelineState::EnsuringModel);
        let fetch = self.ensure_model();

        self.set_state(PipelineState::Preprocessing);
        let image = match preprocess::prepare(capture_file.path()) {
            Ok(image) => image,
            Err(e) => {
                error!(error = %e, path = %capture_file.path().display(), "Could not load capture");
                self.set_state(PipelineState::Delivering);
                self.delivery.deliver_failure(fetch);
                return RunOutcome::LoadFailed;
            }
        };

        self.set_state(PipelineState::Recognizing);
        let result = match self.recognizer.recognize(&image, &self.config.language) {
            Ok(result) => result,
            Err(e) => {
                // Reported to the user the same way as "no text found".
                warn!(error = %e, "Recognition failed");
                OcrResult::default()
            }
        };

        self.set_state(PipelineState::Delivering);
        let copied = self.delivery.deliver(&result, fetch);
        RunOutcome::Delivered { copied }
    }

    fn ensure_model(&self) -> ModelFetchOutcome {
        let language = self.config.language.as_str();
        if self.models.is_present(language) {
            return ModelFetchOutcome::AlreadyPresent;
        }

        self.delivery.announce_download(language);
        if self.models.ensure(language) {
            ModelFetchOutcome::Downloaded
        } else {
            ModelFetchOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::tests::{MemoryClipboard, RecordingNotifier};
    use crate::delivery::{MSG_CAPTURE_UNREADABLE, MSG_NETWORK_UNAVAILABLE, MSG_TEXT_COPIED};
    use crate::models::tests::{serve, unreachable_url};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    fn png_bytes(value: u8) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([value, value, value]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    /// Writes `bytes` to a fresh file in `dir` on every capture, like the screenshot tool.
    /// Empty bytes behave like the user pressing Escape.
    #[derive(Clone)]
    struct FileCapture {
        dir: PathBuf,
        bytes: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl RegionCapture for FileCapture {
        fn capture(&self) -> Result<CaptureResult, ScreenshotError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let path = self.dir.join(format!("capture-{}.png", n));
            std::fs::write(&path, &self.bytes).map_err(ScreenshotError::TempFile)?;
            Ok(CaptureResult::from_output_file(&path))
        }
    }

    /// Blocks inside `capture` until released, to hold the pipeline mid-run.
    struct BlockingCapture {
        inner: FileCapture,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl RegionCapture for BlockingCapture {
        fn capture(&self) -> Result<CaptureResult, ScreenshotError> {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            self.inner.capture()
        }
    }

    struct FailingCapture;

    impl RegionCapture for FailingCapture {
        fn capture(&self) -> Result<CaptureResult, ScreenshotError> {
            Err(ScreenshotError::Unsupported)
        }
    }

    #[derive(Clone, Default)]
    struct ScriptedRecognizer {
        text: Option<String>,
        seen_dark: Arc<Mutex<Vec<bool>>>,
    }

    impl ScriptedRecognizer {
        fn returning(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self::default()
        }

        fn calls(&self) -> usize {
            self.seen_dark.lock().unwrap().len()
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, image: &ImageBuffer, _language: &str) -> Result<OcrResult, OcrError> {
            self.seen_dark.lock().unwrap().push(image.is_dark);
            match &self.text {
                Some(text) => Ok(OcrResult::new(text.clone())),
                None => Err(OcrError::Engine("Failed loading language 'eng'".to_string())),
            }
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        capture_dir: PathBuf,
        model_path: PathBuf,
        notifier: RecordingNotifier,
        clipboard: MemoryClipboard,
        recognizer: ScriptedRecognizer,
        captures: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(recognizer: ScriptedRecognizer) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let capture_dir = dir.path().join("captures");
            std::fs::create_dir_all(&capture_dir).unwrap();
            Self {
                model_path: dir.path().join("tessdata").join("eng.traineddata"),
                capture_dir,
                _dir: dir,
                notifier: RecordingNotifier::default(),
                clipboard: MemoryClipboard::holding("previous"),
                recognizer,
                captures: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn install_model(&self) {
            std::fs::create_dir_all(self.model_path.parent().unwrap()).unwrap();
            std::fs::write(&self.model_path, b"model").unwrap();
        }

        fn file_capture(&self, bytes: Vec<u8>) -> FileCapture {
            FileCapture {
                dir: self.capture_dir.clone(),
                bytes,
                calls: Arc::clone(&self.captures),
            }
        }

        fn controller(
            &self,
            capture: Box<dyn RegionCapture>,
            base_url: &str,
        ) -> PipelineController {
            let root = self.capture_dir.parent().unwrap();
            let mut config = PipelineConfig::with_dirs(root.join("tessdata"), root.join("scratch"));
            config.model_base_url = base_url.to_string();
            let stages = PipelineStages {
                capture,
                models: Box::new(LanguageModelProvider::new(&config).unwrap()),
                recognizer: Box::new(self.recognizer.clone()),
                notifier: Box::new(self.notifier.clone()),
                clipboard: Box::new(self.clipboard.clone()),
            };
            PipelineController::new(config, stages)
        }

        fn leftover_captures(&self) -> usize {
            std::fs::read_dir(&self.capture_dir).unwrap().count()
        }
    }

    #[test]
    fn test_cancelled_capture_does_nothing() {
        let h = Harness::new(ScriptedRecognizer::returning("never"));
        let (url, hits) = serve("200 OK", b"model");
        let controller = h.controller(Box::new(h.file_capture(Vec::new())), &url);

        assert_eq!(controller.run(), RunOutcome::Cancelled);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(h.notifier.messages().is_empty());
        assert_eq!(h.clipboard.contents(), "previous");
        assert_eq!(h.recognizer.calls(), 0);
        assert_eq!(controller.state(), PipelineState::Idle);
    }

    #[test]
    fn test_capture_tool_failure_is_silent() {
        let h = Harness::new(ScriptedRecognizer::returning("never"));
        let controller = h.controller(Box::new(FailingCapture), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::CaptureFailed);
        assert!(h.notifier.messages().is_empty());
        assert_eq!(h.clipboard.writes(), 0);
    }

    #[test]
    fn test_missing_model_is_downloaded_before_recognition() {
        let h = Harness::new(ScriptedRecognizer::returning("Hello World"));
        let (url, hits) = serve("200 OK", b"trained");
        let controller = h.controller(Box::new(h.file_capture(png_bytes(230))), &url);

        assert_eq!(controller.run(), RunOutcome::Delivered { copied: true });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&h.model_path).unwrap(), b"trained");
        assert_eq!(h.recognizer.calls(), 1);
        assert_eq!(
            h.notifier.messages(),
            ["Downloading language data for eng", MSG_TEXT_COPIED]
        );
    }

    #[test]
    fn test_unreachable_network_is_reported_and_recognition_still_runs() {
        let h = Harness::new(ScriptedRecognizer::failing());
        let controller = h.controller(Box::new(h.file_capture(png_bytes(230))), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::Delivered { copied: false });
        assert_eq!(h.recognizer.calls(), 1);
        assert!(h.notifier.messages().contains(&MSG_NETWORK_UNAVAILABLE.to_string()));
        assert!(!h.notifier.messages().contains(&MSG_TEXT_COPIED.to_string()));
        assert_eq!(h.clipboard.contents(), "previous");
        assert!(!h.model_path.exists());
    }

    #[test]
    fn test_recognized_text_lands_on_clipboard() {
        let h = Harness::new(ScriptedRecognizer::returning("Hello World"));
        h.install_model();
        let controller = h.controller(Box::new(h.file_capture(png_bytes(230))), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::Delivered { copied: true });
        assert_eq!(h.clipboard.contents(), "Hello World");
        assert_eq!(h.notifier.messages(), [MSG_TEXT_COPIED]);
        assert_eq!(h.leftover_captures(), 0);
    }

    #[test]
    fn test_empty_text_leaves_clipboard_alone() {
        let h = Harness::new(ScriptedRecognizer::returning(""));
        h.install_model();
        let controller = h.controller(Box::new(h.file_capture(png_bytes(230))), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::Delivered { copied: false });
        assert_eq!(h.clipboard.contents(), "previous");
        assert_eq!(h.clipboard.writes(), 0);
        assert!(h.notifier.messages().is_empty());
    }

    #[test]
    fn test_recognition_error_is_silent() {
        let h = Harness::new(ScriptedRecognizer::failing());
        h.install_model();
        let controller = h.controller(Box::new(h.file_capture(png_bytes(230))), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::Delivered { copied: false });
        assert!(h.notifier.messages().is_empty());
        assert_eq!(h.clipboard.writes(), 0);
    }

    #[test]
    fn test_undecodable_capture_aborts_with_failure_notice() {
        let h = Harness::new(ScriptedRecognizer::returning("never"));
        h.install_model();
        let controller =
            h.controller(Box::new(h.file_capture(b"not an image".to_vec())), &unreachable_url());

        assert_eq!(controller.run(), RunOutcome::LoadFailed);
        assert_eq!(h.recognizer.calls(), 0);
        assert_eq!(h.notifier.messages(), [MSG_CAPTURE_UNREADABLE]);
        assert_eq!(h.leftover_captures(), 0);
        assert_eq!(controller.state(), PipelineState::Idle);
    }

    #[test]
    fn test_dark_capture_reaches_engine_inverted() {
        let h = Harness::new(ScriptedRecognizer::returning("$ ls"));
        h.install_model();
        let controller = h.controller(Box::new(h.file_capture(png_bytes(20))), &unreachable_url());

        controller.run();
        controller.run();
        assert_eq!(*h.recognizer.seen_dark.lock().unwrap(), [true, true]);
        assert_eq!(h.captures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_trigger_during_run_is_ignored() {
        let h = Harness::new(ScriptedRecognizer::returning("Hello World"));
        h.install_model();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let capture = BlockingCapture {
            inner: h.file_capture(png_bytes(230)),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let controller = Arc::new(h.controller(Box::new(capture), &unreachable_url()));

        let worker = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || controller.run())
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(controller.state(), PipelineState::Capturing);
        assert_eq!(controller.run(), RunOutcome::Ignored);

        release_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap(), RunOutcome::Delivered { copied: true });
        assert_eq!(h.captures.load(Ordering::SeqCst), 1);
        assert_eq!(h.clipboard.writes(), 1);
        assert_eq!(controller.state(), PipelineState::Idle);
    }
}
