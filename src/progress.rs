//! Progress callbacks and the cooperative stop flag.
//!
//! Inject an [`Arc<dyn CaptureProgressCallback>`] via
//! [`crate::config::CaptureConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each slide. The terminal binary
//! drives an indicatif bar from it; the web shell forwards it to a broadcast
//! channel (see [`crate::events::EventSink`]).
//!
//! # Example
//!
//! ```rust
//! use slide_capture::{CaptureConfig, CaptureProgressCallback, SlideRecord};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl CaptureProgressCallback for Counter {
//!     fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total_slides}: {}", slide.text);
//!     }
//! }
//!
//! let config = CaptureConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{OutputFiles, RunOutcome, SlideRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Called by the pipeline as it processes each slide.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Slides are processed one at a time, so calls never
/// overlap within a run.
pub trait CaptureProgressCallback: Send + Sync {
    /// Called once the presentation is open, before the first slide.
    fn on_run_start(&self, total_slides: usize) {
        let _ = total_slides;
    }

    /// Called before slide `index` is captured.
    fn on_slide_start(&self, index: usize, total_slides: usize) {
        let _ = (index, total_slides);
    }

    /// Called after a slide has been captured, read and appended.
    ///
    /// Progress after this call is `slide.index / total_slides`.
    fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
        let _ = (slide, total_slides);
    }

    /// Called when the stop flag was observed before slide `completed + 1`.
    fn on_stopped(&self, completed: usize, total_slides: usize) {
        let _ = (completed, total_slides);
    }

    /// Called once after the outputs are written (or skipped, for an empty run).
    fn on_run_complete(&self, outcome: RunOutcome, files: Option<&OutputFiles>) {
        let _ = (outcome, files);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptureProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptureConfig`].
pub type ProgressCallback = Arc<dyn CaptureProgressCallback>;

/// Cooperative cancellation token for one extraction run.
///
/// Clones share the same flag. The pipeline checks it once at the top of
/// every slide iteration, so a stop takes effect only after the slide in
/// flight has been captured, read and appended.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop before its next slide.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
