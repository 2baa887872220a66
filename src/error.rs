//! Error types for the slide-capture library.
//!
//! Every external collaborator (WebDriver, the filesystem, Tesseract,
//! LibreOffice) can fail, and none of those failures is retried: a run that
//! hits one stops where it is and the error is returned to the caller as a
//! [`CaptureError`]. The only intentional early exit is the cooperative
//! [`crate::progress::StopFlag`], which is not an error at all and shows up as
//! [`crate::output::RunOutcome::Stopped`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the slide-capture library.
#[derive(Debug, Error)]
pub enum CaptureError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The start request was rejected before anything was launched.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Browser errors ────────────────────────────────────────────────────
    /// The WebDriver binary could not be started.
    #[error(
        "Failed to launch WebDriver '{driver}': {source}\n\
Install chromedriver and make sure it is on PATH, or pass --chromedriver / --webdriver-url."
    )]
    DriverLaunch {
        driver: String,
        #[source]
        source: std::io::Error,
    },

    /// The WebDriver process started but never reported ready.
    #[error("WebDriver at '{url}' did not become ready within {secs}s")]
    DriverTimeout { url: String, secs: u64 },

    /// A browser session could not be created.
    #[error("Failed to open a browser session on '{url}': {detail}")]
    Session { url: String, detail: String },

    /// A WebDriver command (navigate, screenshot, send keys, quit) failed.
    #[error("Browser command '{command}' failed: {detail}")]
    Browser { command: &'static str, detail: String },

    // ── Image errors ──────────────────────────────────────────────────────
    /// A screenshot file could not be read or decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// A preprocessed image could not be written for the OCR engine.
    #[error("Failed to encode image '{path}': {detail}")]
    ImageEncode { path: PathBuf, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR binary is not installed or not executable.
    #[error(
        "OCR engine '{binary}' is not available: {detail}\n\
Install Tesseract (e.g. `apt-get install tesseract-ocr`) or pass --tesseract."
    )]
    OcrUnavailable { binary: String, detail: String },

    /// The OCR engine ran but exited unsuccessfully.
    #[error("OCR failed for slide {slide}: {detail}")]
    OcrFailed { slide: usize, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// Slides must be appended in strictly increasing index order.
    #[error("Slide {index} appended after slide {previous}; slides must be appended in order")]
    DocumentOutOfOrder { index: usize, previous: usize },

    /// The document could not be serialised or written.
    #[error("Failed to write document '{path}': {detail}")]
    DocumentWrite { path: PathBuf, detail: String },

    /// The PDF converter binary is not installed or not executable.
    #[error(
        "PDF converter '{binary}' is not available: {detail}\n\
Install LibreOffice (provides `soffice`) or pass --soffice."
    )]
    PdfUnavailable { binary: String, detail: String },

    /// The PDF converter ran but produced no output.
    #[error("PDF conversion of '{path}' failed: {detail}")]
    PdfFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation on a working file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Wrap an [`std::io::Error`] together with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller's request rather than the run.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CaptureError::InvalidInput(_) | CaptureError::InvalidConfig(_)
        )
    }
}
