//! Text recognition: run OCR over a preprocessed slide and sanitise it.
//!
//! The engine sits behind [`TextRecognizer`] so the orchestrator does not care
//! whether text comes from the Tesseract CLI, a library binding, or a test
//! double. The default [`TesseractCli`] writes the binarised image to a
//! temporary PNG and runs `tesseract <png> stdout`.

use crate::error::CaptureError;
use crate::pipeline::clean::clean_text;
use image::{GrayImage, ImageFormat};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

/// An OCR engine that turns a binarised image into raw text.
pub trait TextRecognizer: Send + Sync {
    /// Recognise the text on slide `slide` (used for error context only).
    fn recognize(
        &self,
        slide: usize,
        image: &GrayImage,
    ) -> impl Future<Output = Result<String, CaptureError>> + Send;
}

/// Run OCR and sanitise the result with [`clean_text`].
pub async fn extract_text<R: TextRecognizer>(
    recognizer: &R,
    slide: usize,
    image: &GrayImage,
) -> Result<String, CaptureError> {
    let raw = recognizer.recognize(slide, image).await?;
    let text = clean_text(&raw);
    debug!(
        "Slide {}: {} raw chars → {} clean chars",
        slide,
        raw.len(),
        text.len()
    );
    Ok(text)
}

/// Tesseract invoked as an external process.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `tesseract --version` and return the first banner line.
    pub async fn ensure_available(&self) -> Result<String, CaptureError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(self.unavailable(format!("--version exited with {}", output.status)));
        }
        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    fn unavailable(&self, detail: String) -> CaptureError {
        CaptureError::OcrUnavailable {
            binary: self.binary.display().to_string(),
            detail,
        }
    }
}

impl TextRecognizer for TesseractCli {
    async fn recognize(&self, slide: usize, image: &GrayImage) -> Result<String, CaptureError> {
        let image = image.clone();
        let tmp = tokio::task::spawn_blocking(move || write_temp_png(&image))
            .await
            .map_err(|e| CaptureError::Internal(format!("OCR encode task failed: {e}")))??;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(CaptureError::OcrFailed {
                slide,
                detail: format!(
                    "{} exited with {}: {}",
                    self.binary.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        // `tmp` is dropped (and the file deleted) on return
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Encode `image` into a temporary PNG that is deleted when dropped.
fn write_temp_png(image: &GrayImage) -> Result<NamedTempFile, CaptureError> {
    let tmp = tempfile::Builder::new()
        .prefix("slide-ocr-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| CaptureError::Internal(format!("tempfile: {e}")))?;
    image
        .save_with_format(tmp.path(), ImageFormat::Png)
        .map_err(|e| CaptureError::ImageEncode {
            path: tmp.path().to_path_buf(),
            detail: e.to_string(),
        })?;
    Ok(tmp)
}
