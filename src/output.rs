//! Result types produced by an extraction run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of an extraction run: `Idle → Running → {Completed | Stopped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Stopped,
}

impl RunState {
    /// Whether `self → next` is a legal transition.
    ///
    /// A finished run may be followed by a new one (`Completed → Running`,
    /// `Stopped → Running`), and a run that failed returns to `Idle`.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle | Completed | Stopped, Running)
                | (Running, Completed | Stopped | Idle)
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped)
    }
}

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every requested slide was processed.
    Completed,
    /// The stop flag ended the loop early.
    Stopped,
}

impl From<RunOutcome> for RunState {
    fn from(o: RunOutcome) -> Self {
        match o {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Stopped => RunState::Stopped,
        }
    }
}

/// One processed slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    /// 1-based slide index.
    pub index: usize,
    /// Sanitised OCR text.
    pub text: String,
    /// Screenshot on disk (removed by cleanup).
    pub image_path: PathBuf,
    /// Capture + OCR + append time for this slide.
    pub duration_ms: u64,
}

/// The generated document and the PDF derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub document: PathBuf,
    pub pdf: PathBuf,
}

/// Timing and count summary for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub requested_slides: usize,
    pub captured_slides: usize,
    pub total_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub pdf_duration_ms: u64,
}

/// Everything a finished (non-failed) run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutput {
    pub outcome: RunOutcome,
    /// Processed slides in index order.
    pub slides: Vec<SlideRecord>,
    /// `None` when the run was stopped before the first slide.
    pub files: Option<OutputFiles>,
    pub stats: CaptureStats,
}
