//! Tesseract OCR via the `tesseract` command-line tool

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info, warn};

use super::{OcrError, OcrRequest, OcrResult};
use crate::config::PipelineConfig;
use crate::paths;
use crate::preprocess::ImageBuffer;

pub struct TesseractEngine {
    binary: PathBuf,
    tessdata_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl TesseractEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            binary: config.tesseract_binary.clone(),
            tessdata_dir: config.model_dir.clone(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Runs recognition on a prepared image.
    ///
    /// Empty output is a valid result, not an error. A missing model or a failing
    /// engine process is reported as [`OcrError`].
    pub fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<OcrResult, OcrError> {
        self.run(&OcrRequest::new(image, language))
    }

    fn run(&self, request: &OcrRequest<'_>) -> Result<OcrResult, OcrError> {
        let model_path = self
            .tessdata_dir
            .join(format!("{}.traineddata", request.language));
        if !model_path.is_file() {
            warn!(path = %model_path.display(), "Trained data missing, cannot run OCR");
            return Err(OcrError::ModelMissing(model_path.display().to_string()));
        }

        fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            OcrError::ImageConversion(format!("Failed to create scratch directory: {}", e))
        })?;
        let image_path = self
            .scratch_dir
            .join(paths::timestamped_file_name("ocr", "png"));
        request
            .image
            .save_png(&image_path)
            .map_err(|e| OcrError::ImageConversion(e.to_string()))?;

        debug!(
            binary = %self.binary.display(),
            image = %image_path.display(),
            language = request.language,
            "Running tesseract"
        );

        let output = Command::new(&self.binary)
            .args(command_args(request, &image_path, &self.tessdata_dir))
            .output();

        if let Err(e) = fs::remove_file(&image_path) {
            warn!(error = %e, path = %image_path.display(), "Failed to remove scratch image");
        }

        let output = output.map_err(|e| {
            error!(error = %e, "Failed to execute tesseract");
            OcrError::Engine(format!("Failed to execute tesseract: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                code = output.status.code().unwrap_or(-1),
                stderr = %stderr.trim(),
                "Text extraction failed"
            );
            return Err(OcrError::Engine(format!(
                "Text extraction failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(chars = text.len(), "OCR completed");
        debug!(text = %text.chars().take(100).collect::<String>(), "Extracted text preview");
        Ok(OcrResult::new(text))
    }
}

/// `tesseract <image> stdout -l <lang> --oem <n> --psm <n> --tessdata-dir <dir> -c page_separator=`
fn command_args(
    request: &OcrRequest<'_>,
    image_path: &Path,
    tessdata_dir: &Path,
) -> Vec<OsString> {
    vec![
        image_path.as_os_str().to_owned(),
        "stdout".into(),
        "-l".into(),
        request.language.into(),
        "--oem".into(),
        request.engine_mode.as_arg().into(),
        "--psm".into(),
        request.page_segmentation_mode.as_arg().into(),
        "--tessdata-dir".into(),
        tessdata_dir.as_os_str().to_owned(),
        "-c".into(),
        "page_separator=".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::prepare_rgb;

    fn engine_in(dir: &Path, binary: &str) -> TesseractEngine {
        let mut config = PipelineConfig::with_dirs(dir.join("tessdata"), dir.join("scratch"));
        config.tesseract_binary = PathBuf::from(binary);
        TesseractEngine::new(&config)
    }

    #[test]
    fn test_command_args_layout() {
        let image = prepare_rgb(1, 1, vec![255, 255, 255]);
        let request = OcrRequest::new(&image, "eng");
        let args = command_args(&request, Path::new("/tmp/in.png"), Path::new("/models"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "/tmp/in.png",
                "stdout",
                "-l",
                "eng",
                "--oem",
                "3",
                "--psm",
                "6",
                "--tessdata-dir",
                "/models",
                "-c",
                "page_separator="
            ]
        );
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path(), "tesseract");
        let image = prepare_rgb(1, 1, vec![255, 255, 255]);

        let result = engine.recognize(&image, "eng");
        assert!(matches!(result, Err(OcrError::ModelMissing(_))));
    }

    #[test]
    fn test_unlaunchable_engine_is_an_error_and_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let tessdata = dir.path().join("tessdata");
        fs::create_dir_all(&tessdata).unwrap();
        fs::write(tessdata.join("eng.traineddata"), b"model").unwrap();
        let engine = engine_in(dir.path(), "/nonexistent/pine-test-tesseract");
        let image = prepare_rgb(2, 2, vec![255; 12]);

        let result = engine.recognize(&image, "eng");
        assert!(matches!(result, Err(OcrError::Engine(_))));
        let leftovers = fs::read_dir(dir.path().join("scratch")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
