//! OCR (Optical Character Recognition) functionality

mod tesseract;

pub use tesseract::TesseractEngine;

use thiserror::Error;

use crate::preprocess::ImageBuffer;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Language model not found: {0}")]
    ModelMissing(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Failed to hand image to OCR engine: {0}")]
    ImageConversion(String),
}

/// Recognition algorithm family (`--oem`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Whatever the trained data supports; LSTM for `tessdata_best` models.
    Default,
}

impl EngineMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Default => "3",
        }
    }
}

/// Expected text layout (`--psm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegmentationMode {
    /// A single uniform block of text.
    SingleBlock,
}

impl PageSegmentationMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::SingleBlock => "6",
        }
    }
}

/// Immutable description of one recognition call.
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    pub image: &'a ImageBuffer,
    pub language: &'a str,
    pub engine_mode: EngineMode,
    pub page_segmentation_mode: PageSegmentationMode,
}

impl<'a> OcrRequest<'a> {
    /// Request with the fixed engine configuration used for region captures.
    pub fn new(image: &'a ImageBuffer, language: &'a str) -> Self {
        Self {
            image,
            language,
            engine_mode: EngineMode::Default,
            page_segmentation_mode: PageSegmentationMode::SingleBlock,
        }
    }
}

/// Text exactly as the engine produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OcrResult {
    pub text: String,
}

impl OcrResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Zero-length text; whitespace-only output still counts as text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
