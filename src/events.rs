//! Serialisable run events for streaming consumers.
//!
//! [`EventSink`] is a [`CaptureProgressCallback`] that turns pipeline
//! callbacks into [`CaptureEvent`]s on a `tokio::sync::broadcast` channel.
//! The web shell forwards them to browsers as Server-Sent Events; any other
//! host can subscribe the same way. A lagging subscriber only misses events,
//! it never slows the pipeline down.

use crate::output::{RunOutcome, SlideRecord};
use crate::progress::CaptureProgressCallback;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// One event in the life of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// The presentation is open and the slide loop is about to start.
    Started { total_slides: usize },
    /// A slide was captured, read and appended.
    Slide {
        index: usize,
        total_slides: usize,
        text: String,
        /// Where the shell serves this slide's screenshot.
        image_url: String,
        /// `index / total_slides`, in `0.0..=1.0`.
        progress: f32,
    },
    /// The stop flag ended the run early.
    Stopped {
        completed: usize,
        total_slides: usize,
        message: String,
    },
    /// Outputs are ready (links are `None` when nothing was captured).
    Finished {
        outcome: RunOutcome,
        captured: usize,
        document_url: Option<String>,
        pdf_url: Option<String>,
    },
    /// The run aborted with an error.
    Failed { message: String },
    /// Screenshots and output files were deleted.
    CleanedUp,
}

/// Fractional progress after `index` of `total` slides.
pub fn progress_fraction(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (index as f32 / total as f32).clamp(0.0, 1.0)
}

/// URL under which the shell serves slide `index`.
pub fn slide_image_url(index: usize) -> String {
    format!("/slides/{index}")
}

/// Forwards pipeline callbacks to a broadcast channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<CaptureEvent>,
}

impl EventSink {
    pub fn new(tx: broadcast::Sender<CaptureEvent>) -> Self {
        Self { tx }
    }

    /// Publish `event`; having no subscribers is not an error.
    pub fn send(&self, event: CaptureEvent) {
        if self.tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.tx.subscribe()
    }
}

impl CaptureProgressCallback for EventSink {
    fn on_run_start(&self, total_slides: usize) {
        self.send(CaptureEvent::Started { total_slides });
    }

    fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
        self.send(CaptureEvent::Slide {
            index: slide.index,
            total_slides,
            text: slide.text.clone(),
            image_url: slide_image_url(slide.index),
            progress: progress_fraction(slide.index, total_slides),
        });
    }

    fn on_stopped(&self, completed: usize, total_slides: usize) {
        self.send(CaptureEvent::Stopped {
            completed,
            total_slides,
            message: format!("Extraction stopped after {completed} of {total_slides} slides"),
        });
    }
}
