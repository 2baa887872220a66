//! Pipeline stages for slide capture.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the external collaborators (browser, OCR engine, PDF converter)
//! can be swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! browser ──▶ preprocess ──▶ ocr ──▶ clean ──▶ document ──▶ pdf
//! (PNG)       (binarise)    (text)  (sanitise) (docx)       (soffice)
//! ```
//!
//! 1. [`browser`]: navigate, screenshot and page forward over WebDriver
//! 2. [`preprocess`]: grayscale + adaptive Gaussian threshold; CPU-bound,
//!    runs in `spawn_blocking`
//! 3. [`ocr`]: image → raw text through the Tesseract CLI
//! 4. [`clean`]: whitelist filter and whitespace collapsing
//! 5. [`document`]: heading / paragraph / image per slide, saved as DOCX
//! 6. [`pdf`]: derive the PDF from the saved DOCX

pub mod browser;
pub mod clean;
pub mod document;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
