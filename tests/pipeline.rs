//! Integration tests for the extraction run.
//!
//! The browser, OCR engine and PDF converter are in-process fakes, so these
//! run everywhere without Chrome, Tesseract or LibreOffice.

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use image::{ImageFormat, Rgb, RgbImage};
use slide_capture::pipeline::browser::SlideBrowser;
use slide_capture::pipeline::ocr::TextRecognizer;
use slide_capture::pipeline::pdf::{pdf_path_for, PdfConverter};
use slide_capture::{
    cleanup_artifacts, run_pipeline, CaptureConfig, CaptureError, CaptureProgressCallback,
    OutputFiles, RunOutcome, SettleStrategy, SlideRecord, StopFlag,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// A deck of `slides` solid-colour PNGs; the arrow key moves to the next one.
#[derive(Default)]
struct FakeDeck {
    current: usize,
    navigated: Option<String>,
    keys: usize,
    closed: bool,
}

fn slide_png(index: usize) -> Vec<u8> {
    let shade = (index * 40 % 256) as u8;
    let img = RgbImage::from_fn(64, 32, |x, _| {
        if x < 8 {
            Rgb([0, 0, 0])
        } else {
            Rgb([shade, 255 - shade, 128])
        }
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

impl SlideBrowser for FakeDeck {
    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.navigated = Some(url.to_string());
        self.current = 1;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, CaptureError> {
        Ok(slide_png(self.current))
    }

    async fn press_next(&mut self) -> Result<(), CaptureError> {
        self.keys += 1;
        self.current += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        self.closed = true;
        Ok(())
    }
}

/// Returns messy text per slide; optionally fails on one slide.
struct FakeOcr {
    fail_on: Option<usize>,
}

impl TextRecognizer for FakeOcr {
    async fn recognize(&self, slide: usize, _image: &image::GrayImage) -> Result<String, CaptureError> {
        if self.fail_on == Some(slide) {
            return Err(CaptureError::OcrFailed {
                slide,
                detail: "engine crashed".into(),
            });
        }
        Ok(format!("Slide {slide} title\n\n  • point   one  \u{2192} two\n"))
    }
}

/// Writes a placeholder PDF next to the document.
struct FakePdf;

impl PdfConverter for FakePdf {
    async fn convert(&self, document: &Path) -> Result<PathBuf, CaptureError> {
        assert!(document.exists(), "document must be saved before conversion");
        let pdf = pdf_path_for(document);
        tokio::fs::write(&pdf, b"%PDF-1.4 fake").await.unwrap();
        Ok(pdf)
    }
}

/// Records callbacks and optionally stops the run when slide `stop_at` starts.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    stop: Option<(usize, StopFlag)>,
}

impl CaptureProgressCallback for Recorder {
    fn on_run_start(&self, total_slides: usize) {
        self.events.lock().unwrap().push(format!("start {total_slides}"));
    }

    fn on_slide_start(&self, index: usize, _total_slides: usize) {
        if let Some((at, stop)) = &self.stop {
            if *at == index {
                stop.stop();
            }
        }
    }

    fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("slide {}/{total_slides}", slide.index));
    }

    fn on_stopped(&self, completed: usize, total_slides: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("stopped {completed}/{total_slides}"));
    }

    fn on_run_complete(&self, outcome: RunOutcome, files: Option<&OutputFiles>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {outcome:?} files={}", files.is_some()));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const URL: &str = "https://slides.example.com/deck";

fn config(dir: &Path, slides: usize, recorder: Option<Arc<Recorder>>) -> CaptureConfig {
    let mut builder = CaptureConfig::builder()
        .work_dir(dir)
        .total_slides(slides)
        .settle(SettleStrategy::Fixed)
        .open_delay_ms(0)
        .advance_delay_ms(0);
    if let Some(r) = recorder {
        builder = builder.progress_callback(r);
    }
    builder.build().unwrap()
}

fn events(recorder: &Recorder) -> Vec<String> {
    recorder.events.lock().unwrap().clone()
}

/// Texts of paragraphs styled `style`, and the number of embedded drawings.
fn read_document(path: &Path, style: &str) -> (Vec<String>, usize) {
    let docx = docx_rs::read_docx(&std::fs::read(path).unwrap()).unwrap();
    let mut headings = Vec::new();
    let mut drawings = 0;
    for child in &docx.document.children {
        let DocumentChild::Paragraph(p) = child else {
            continue;
        };
        let mut text = String::new();
        for pc in &p.children {
            let ParagraphChild::Run(run) = pc else {
                continue;
            };
            for rc in &run.children {
                match rc {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Drawing(_) => drawings += 1,
                    _ => {}
                }
            }
        }
        if p.property.style.as_ref().is_some_and(|s| s.val == style) {
            headings.push(text);
        }
    }
    (headings, drawings)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_captures_every_slide_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let cfg = config(dir.path(), 3, Some(recorder.clone()));
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &StopFlag::new())
        .await
        .unwrap();

    assert_eq!(out.outcome, RunOutcome::Completed);
    let indices: Vec<usize> = out.slides.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(out.slides[1].text, "Slide 2 title point one two");
    for slide in &out.slides {
        assert_eq!(slide.image_path, cfg.screenshot_path(slide.index));
        assert_eq!(std::fs::read(&slide.image_path).unwrap(), slide_png(slide.index));
    }

    // No key press after the last slide
    assert_eq!(deck.keys, 2);
    assert_eq!(deck.navigated.as_deref(), Some(URL));
    assert!(deck.closed);

    let files = out.files.expect("outputs");
    assert_eq!(files.document, dir.path().join("Extracted_Presentation.docx"));
    assert_eq!(files.pdf, dir.path().join("Extracted_Presentation.pdf"));
    assert!(files.document.exists());
    assert!(files.pdf.exists());

    assert_eq!(out.stats.requested_slides, 3);
    assert_eq!(out.stats.captured_slides, 3);
    assert_eq!(
        events(&recorder),
        vec![
            "start 3",
            "slide 1/3",
            "slide 2/3",
            "slide 3/3",
            "complete Completed files=true",
        ]
    );
}

#[tokio::test]
async fn hundred_slide_run_writes_every_heading_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 100, None);
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &StopFlag::new())
        .await
        .unwrap();

    assert_eq!(out.outcome, RunOutcome::Completed);
    assert_eq!(out.slides.len(), 100);
    assert_eq!(deck.keys, 99);
    let shots = std::fs::read_dir(cfg.screenshot_dir()).unwrap().count();
    assert_eq!(shots, 100);

    let files = out.files.unwrap();
    let (headings, drawings) = read_document(&files.document, "Heading2");
    let expected: Vec<String> = (1..=100).map(|i| format!("Slide {i}")).collect();
    assert_eq!(headings, expected);
    assert_eq!(drawings, 100);

    let (title, _) = read_document(&files.document, "Heading1");
    assert_eq!(title, vec![cfg.document_title.clone()]);
}

#[tokio::test]
async fn stop_during_slide_keeps_captured_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let stop = StopFlag::new();
    let recorder = Arc::new(Recorder {
        stop: Some((2, stop.clone())),
        ..Recorder::default()
    });
    let cfg = config(dir.path(), 5, Some(recorder.clone()));
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &stop)
        .await
        .unwrap();

    // The slide in flight when the flag was set still completes
    assert_eq!(out.outcome, RunOutcome::Stopped);
    assert_eq!(out.slides.len(), 2);
    assert!(cfg.screenshot_path(2).exists());
    assert!(!cfg.screenshot_path(3).exists());
    assert_eq!(deck.keys, 2);
    assert!(deck.closed);

    let files = out.files.expect("a stopped run with slides still has outputs");
    assert!(files.document.exists());
    assert!(files.pdf.exists());
    assert_eq!(
        events(&recorder),
        vec![
            "start 5",
            "slide 1/5",
            "slide 2/5",
            "stopped 2/5",
            "complete Stopped files=true",
        ]
    );
}

#[tokio::test]
async fn stop_before_first_slide_produces_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 4, None);
    let stop = StopFlag::new();
    stop.stop();
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &stop)
        .await
        .unwrap();

    assert_eq!(out.outcome, RunOutcome::Stopped);
    assert!(out.slides.is_empty());
    assert!(out.files.is_none());
    assert!(deck.closed);
    assert!(!cfg.document_path().exists());
    assert!(!cfg.screenshot_path(1).exists());
}

#[tokio::test]
async fn single_slide_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 1, None);
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &StopFlag::new())
        .await
        .unwrap();

    assert_eq!(out.slides.len(), 1);
    assert_eq!(deck.keys, 0);
    let files = out.files.unwrap();
    assert_eq!(files.document.file_stem(), files.pdf.file_stem());
    assert_eq!(files.pdf.extension().unwrap(), "pdf");
}

#[tokio::test]
async fn ocr_error_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let cfg = config(dir.path(), 3, Some(recorder.clone()));
    let mut deck = FakeDeck::default();

    let err = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: Some(2) }, &FakePdf, &StopFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::OcrFailed { slide: 2, .. }), "got {err:?}");
    assert!(!cfg.document_path().exists());
    // The screenshot for the failing slide was already written
    assert!(cfg.screenshot_path(2).exists());
    assert!(!deck.closed);
    assert_eq!(events(&recorder), vec!["start 3", "slide 1/3"]);
}

#[tokio::test]
async fn empty_url_is_rejected_before_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2, None);
    let mut deck = FakeDeck::default();

    let err = run_pipeline("  ", &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &StopFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::InvalidInput(_)));
    assert!(deck.navigated.is_none());
}

#[tokio::test]
async fn cleanup_removes_screenshots_and_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), 2, None);
    let mut deck = FakeDeck::default();

    let out = run_pipeline(URL, &cfg, &mut deck, &FakeOcr { fail_on: None }, &FakePdf, &StopFlag::new())
        .await
        .unwrap();
    let files = out.files.unwrap();

    cleanup_artifacts(&cfg, Some(&files)).await.unwrap();

    assert!(!cfg.screenshot_dir().exists());
    assert!(std::fs::read(&files.document).is_err());
    assert!(std::fs::read(&files.pdf).is_err());

    // Running it twice is harmless
    cleanup_artifacts(&cfg, Some(&files)).await.unwrap();
}
