//! # slide-capture
//!
//! Page through a web slide presentation (Prezi, Google Slides, reveal.js …)
//! in a real browser, screenshot and OCR every slide, and assemble the results
//! into a Word document plus a PDF derived from it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Browser     open the deck over WebDriver, wait for it to render
//!  ├─ 2. Screenshot  slides_images/slide_{i}.png
//!  ├─ 3. Preprocess  grayscale + adaptive Gaussian threshold (spawn_blocking)
//!  ├─ 4. OCR         Tesseract CLI, then whitelist cleanup
//!  ├─ 5. Document    "Slide i" heading, text, screenshot at 5.5in
//!  ├─ 6. Advance     Right-arrow key, wait until the page settles
//!  └─ 7. Output      save .docx, quit browser, derive .pdf via LibreOffice
//! ```
//!
//! Every step runs strictly in order. A [`StopFlag`] checked at the top of
//! each slide iteration ends the run early; the outputs then contain the
//! slides captured so far.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slide_capture::{extract, CaptureConfig, StopFlag};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaptureConfig::builder().total_slides(8).build()?;
//!     let output = extract("https://prezi.com/view/abc123", &config, &StopFlag::new()).await?;
//!     for slide in &output.slides {
//!         println!("Slide {}: {}", slide.index, slide.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Used for | Override |
//! |------|----------|----------|
//! | `chromedriver` + Chrome | browser automation | [`BrowserConfig::driver_path`], [`BrowserConfig::webdriver_url`] |
//! | `tesseract` | OCR | [`ToolPaths::tesseract`] |
//! | `soffice` (LibreOffice) | DOCX → PDF | [`ToolPaths::soffice`] |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide-capture` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! The web UI lives in [`server`] and is part of the library, so any host
//! binary can mount it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capture::{cleanup_artifacts, extract, run_pipeline, validate_url};
pub use config::{
    BrowserConfig, CaptureConfig, CaptureConfigBuilder, SettleStrategy, ThresholdParams,
    ToolPaths, MAX_SLIDES, MIN_SLIDES,
};
pub use error::CaptureError;
pub use events::{CaptureEvent, EventSink};
pub use output::{CaptureOutput, CaptureStats, OutputFiles, RunOutcome, RunState, SlideRecord};
pub use pipeline::clean::clean_text;
pub use progress::{CaptureProgressCallback, NoopProgressCallback, ProgressCallback, StopFlag};
pub use server::{serve, ShellConfig};
