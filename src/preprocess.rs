//! Image preparation ahead of OCR.
//!
//! Tesseract is tuned for dark text on a light background, so captures of dark-mode
//! windows are photometrically inverted before recognition. Darkness is decided once,
//! from the mean of every channel byte, before any inversion happens.

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Mean intensity (0-255) below which an image counts as dark.
pub const DARK_THRESHOLD: f64 = 127.0;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to read captured image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode captured image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Captured image has invalid dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
}

/// Decoded RGB pixels for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, row-major.
    pub pixels: Vec<u8>,
    /// Whether the capture was dark before preparation. When set, `pixels` holds the
    /// inverted copy.
    pub is_dark: bool,
}

impl ImageBuffer {
    /// Writes the prepared pixels as PNG so an external engine can read them.
    pub fn save_png(&self, path: &Path) -> Result<(), PreprocessError> {
        let image = RgbImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or(
            PreprocessError::Dimensions {
                width: self.width,
                height: self.height,
            },
        )?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Mean over every channel byte, or `None` for an empty buffer.
pub fn mean_intensity(pixels: &[u8]) -> Option<f64> {
    if pixels.is_empty() {
        return None;
    }
    let sum: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    Some(sum as f64 / pixels.len() as f64)
}

pub fn is_dark(pixels: &[u8]) -> bool {
    mean_intensity(pixels).is_some_and(|mean| mean < DARK_THRESHOLD)
}

/// Replaces every channel value with its complement.
pub fn invert(pixels: &mut [u8]) {
    for p in pixels.iter_mut() {
        *p = !*p;
    }
}

/// Builds an [`ImageBuffer`] from raw RGB8 pixels, inverting once if the image is dark.
pub fn prepare_rgb(width: u32, height: u32, mut pixels: Vec<u8>) -> ImageBuffer {
    let dark = is_dark(&pixels);
    if dark {
        invert(&mut pixels);
    }
    ImageBuffer {
        width,
        height,
        pixels,
        is_dark: dark,
    }
}

/// Loads the capture at `path` and prepares it for recognition.
///
/// The format is sniffed from the file contents, not the extension.
pub fn prepare(path: &Path) -> Result<ImageBuffer, PreprocessError> {
    let rgb = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let prepared = prepare_rgb(width, height, rgb.into_raw());

    debug!(
        width,
        height,
        is_dark = prepared.is_dark,
        path = %path.display(),
        "Image prepared for OCR"
    );
    Ok(prepared)
}
