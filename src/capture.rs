//! The extraction run: page through the deck and build the outputs.
//!
//! ## Steps
//!
//! ```text
//! validate URL ─▶ open ─▶ for i in 1..=N { stop? ─▶ capture ─▶ preprocess
//!                                          ─▶ OCR ─▶ append ─▶ progress ─▶ next }
//!              ─▶ save DOCX ─▶ quit browser ─▶ derive PDF
//! ```
//!
//! Slides are handled strictly one after another. The [`StopFlag`] is read
//! only at the top of each iteration, so a stop request lets the slide in
//! flight finish and the outputs still contain every slide captured so far.
//! Any error from a collaborator ends the run immediately and is returned
//! unchanged.

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::output::{CaptureOutput, CaptureStats, OutputFiles, RunOutcome, SlideRecord};
use crate::pipeline::browser::{SlideBrowser, SlideController, WebDriverBrowser};
use crate::pipeline::document::SlideDocument;
use crate::pipeline::ocr::{extract_text, TesseractCli, TextRecognizer};
use crate::pipeline::pdf::{PdfConverter, SofficeConverter};
use crate::pipeline::preprocess::preprocess;
use crate::progress::StopFlag;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Run one extraction with the default collaborators: chromedriver + Chrome,
/// the Tesseract CLI and LibreOffice.
///
/// The URL is validated and Tesseract is checked before the browser is
/// launched, so the most common setup mistakes fail fast.
///
/// # Example
/// ```rust,no_run
/// use slide_capture::{extract, CaptureConfig, StopFlag};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CaptureConfig::builder().total_slides(12).build()?;
/// let output = extract("https://prezi.com/view/abc123", &config, &StopFlag::new()).await?;
/// if let Some(files) = &output.files {
///     println!("{} / {}", files.document.display(), files.pdf.display());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    url: &str,
    config: &CaptureConfig,
    stop: &StopFlag,
) -> Result<CaptureOutput, CaptureError> {
    validate_url(url)?;

    let recognizer = TesseractCli::new(&config.tools.tesseract);
    let version = recognizer.ensure_available().await?;
    debug!("Using {}", version);
    let converter = SofficeConverter::new(&config.tools.soffice);

    let mut browser = WebDriverBrowser::launch(&config.browser).await?;
    run_pipeline(url, config, &mut browser, &recognizer, &converter, stop).await
}

/// Run one extraction with caller-supplied collaborators.
///
/// # Returns
/// `Ok(CaptureOutput)` for both [`RunOutcome::Completed`] and
/// [`RunOutcome::Stopped`]. `output.files` is `None` only when the run was
/// stopped before its first slide.
///
/// # Errors
/// The first error raised by the browser, the filesystem, the OCR engine or
/// the converter. The browser is not closed on this path; dropping it is
/// what releases the session.
pub async fn run_pipeline<B, R, P>(
    url: &str,
    config: &CaptureConfig,
    browser: &mut B,
    recognizer: &R,
    converter: &P,
    stop: &StopFlag,
) -> Result<CaptureOutput, CaptureError>
where
    B: SlideBrowser,
    R: TextRecognizer,
    P: PdfConverter,
{
    let total_start = Instant::now();
    let url = validate_url(url)?;
    let total = config.total_slides;
    let callback = config.progress_callback.as_ref();
    info!("Starting extraction of {} slides: {}", total, url);

    // ── Step 1: Screenshot directory ─────────────────────────────────────
    let shot_dir = config.screenshot_dir();
    tokio::fs::create_dir_all(&shot_dir)
        .await
        .map_err(|e| CaptureError::io(&shot_dir, e))?;

    // ── Step 2: Open the presentation ────────────────────────────────────
    let mut controller = SlideController::new(
        browser,
        config.settle,
        Duration::from_millis(config.open_delay_ms),
        Duration::from_millis(config.advance_delay_ms),
    );
    let settled = controller.open(url).await?;
    debug!("Presentation open ({:?})", settled);

    if let Some(cb) = callback {
        cb.on_run_start(total);
    }

    // ── Step 3: Slide loop ───────────────────────────────────────────────
    let mut document = SlideDocument::begin(&config.document_title, config.image_width_inches);
    let mut slides: Vec<SlideRecord> = Vec::with_capacity(total);
    let mut outcome = RunOutcome::Completed;
    let mut ocr_duration_ms = 0u64;

    for index in 1..=total {
        if stop.is_stopped() {
            warn!("Extraction stopped after {}/{} slides", slides.len(), total);
            outcome = RunOutcome::Stopped;
            if let Some(cb) = callback {
                cb.on_stopped(slides.len(), total);
            }
            break;
        }

        if let Some(cb) = callback {
            cb.on_slide_start(index, total);
        }
        let slide_start = Instant::now();

        let image_path = config.screenshot_path(index);
        controller.capture(&image_path).await?;

        let params = config.threshold;
        let to_preprocess = image_path.clone();
        let binarised = tokio::task::spawn_blocking(move || preprocess(&to_preprocess, params))
            .await
            .map_err(|e| CaptureError::Internal(format!("preprocess task failed: {e}")))??;

        let ocr_start = Instant::now();
        let text = extract_text(recognizer, index, &binarised).await?;
        ocr_duration_ms += ocr_start.elapsed().as_millis() as u64;

        let (entry_text, entry_image) = (text.clone(), image_path.clone());
        document = tokio::task::spawn_blocking(move || {
            document.append(index, entry_text, &entry_image)?;
            Ok::<_, CaptureError>(document)
        })
        .await
        .map_err(|e| CaptureError::Internal(format!("document task failed: {e}")))??;

        let record = SlideRecord {
            index,
            text,
            image_path,
            duration_ms: slide_start.elapsed().as_millis() as u64,
        };
        info!("Slide {}/{}: {} chars", index, total, record.text.len());
        if let Some(cb) = callback {
            cb.on_slide_complete(&record, total);
        }
        slides.push(record);

        // No key press after the last requested slide
        if index < total {
            let settled = controller.advance().await?;
            debug!("Slide {} → {} ({:?})", index, index + 1, settled);
        }
    }
    drop(controller);

    // ── Step 4: Outputs ──────────────────────────────────────────────────
    let mut pdf_duration_ms = 0u64;
    let files = if slides.is_empty() {
        info!("No slides captured; skipping document output");
        close_browser(browser).await;
        None
    } else {
        let doc_path = config.document_path();
        let document_path = tokio::task::spawn_blocking(move || document.finalize(&doc_path))
            .await
            .map_err(|e| CaptureError::Internal(format!("document task failed: {e}")))??;
        close_browser(browser).await;

        let pdf_start = Instant::now();
        let pdf = converter.convert(&document_path).await?;
        pdf_duration_ms = pdf_start.elapsed().as_millis() as u64;
        Some(OutputFiles {
            document: document_path,
            pdf,
        })
    };

    let stats = CaptureStats {
        requested_slides: total,
        captured_slides: slides.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ocr_duration_ms,
        pdf_duration_ms,
    };

    info!(
        "Extraction {:?}: {}/{} slides, {}ms total",
        outcome, stats.captured_slides, total, stats.total_duration_ms
    );

    if let Some(cb) = callback {
        cb.on_run_complete(outcome, files.as_ref());
    }

    Ok(CaptureOutput {
        outcome,
        slides,
        files,
        stats,
    })
}

/// Delete the screenshot directory and both output files.
///
/// Files that are already gone are not an error. Once this has run, any
/// download link still pointing at the outputs is stale.
pub async fn cleanup_artifacts(
    config: &CaptureConfig,
    files: Option<&OutputFiles>,
) -> Result<(), CaptureError> {
    let shot_dir = config.screenshot_dir();
    match tokio::fs::remove_dir_all(&shot_dir).await {
        Ok(()) => debug!("Removed {}", shot_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CaptureError::io(&shot_dir, e)),
    }

    if let Some(files) = files {
        for path in [&files.document, &files.pdf] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CaptureError::io(path, e)),
            }
        }
    }
    info!("Cleaned up generated artifacts");
    Ok(())
}

/// Trim `url` and require an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<&str, CaptureError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CaptureError::InvalidInput(
            "presentation URL must not be empty".into(),
        ));
    }
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
        Ok(parsed) => Err(CaptureError::InvalidInput(format!(
            "unsupported URL scheme '{}' in '{url}'",
            parsed.scheme()
        ))),
        Err(e) => Err(CaptureError::InvalidInput(format!("'{url}' is not a URL: {e}"))),
    }
}

/// Quit the session; a failed quit does not invalidate outputs already on disk.
async fn close_browser<B: SlideBrowser>(browser: &mut B) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser session: {}", e);
    }
}
