//! Configuration types for a slide capture run.
//!
//! All run behaviour is controlled through [`CaptureConfig`], built via its
//! [`CaptureConfigBuilder`]. The defaults reproduce the classic behaviour:
//! ten slides, a five second settle after opening the presentation, three
//! seconds after each key press, 11/2 adaptive thresholding and a 5.5 inch
//! image width in the document.

use crate::error::CaptureError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Smallest accepted slide count.
pub const MIN_SLIDES: usize = 1;
/// Largest accepted slide count.
pub const MAX_SLIDES: usize = 100;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use slide_capture::CaptureConfig;
///
/// let config = CaptureConfig::builder()
///     .total_slides(25)
///     .work_dir("/tmp/capture")
///     .build()
///     .unwrap();
/// assert_eq!(config.total_slides, 25);
/// ```
#[derive(Clone)]
pub struct CaptureConfig {
    /// Number of slides to page through. Range: 1–100. Default: 10.
    pub total_slides: usize,

    /// Directory that receives the screenshot directory and both output files.
    /// Default: the current directory.
    pub work_dir: PathBuf,

    /// Name of the per-run screenshot directory inside `work_dir`.
    /// Default: `slides_images`.
    pub screenshot_dir_name: String,

    /// File stem shared by the document and its PDF. Default: `Extracted_Presentation`.
    pub output_stem: String,

    /// Level-1 heading at the top of the document. Default: `Extracted Slides Data`.
    pub document_title: String,

    /// Display width of each embedded screenshot, in inches. Default: 5.5.
    pub image_width_inches: f32,

    /// Upper bound on the wait after the presentation is opened. Default: 5000.
    pub open_delay_ms: u64,

    /// Upper bound on the wait after each "next slide" key press. Default: 3000.
    pub advance_delay_ms: u64,

    /// How the controller decides that a slide has finished rendering.
    pub settle: SettleStrategy,

    /// Adaptive threshold parameters for the OCR preprocessor.
    pub threshold: ThresholdParams,

    /// WebDriver / Chrome settings.
    pub browser: BrowserConfig,

    /// External tool locations (OCR engine, PDF converter).
    pub tools: ToolPaths,

    /// Optional per-slide progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            total_slides: 10,
            work_dir: PathBuf::from("."),
            screenshot_dir_name: "slides_images".to_string(),
            output_stem: "Extracted_Presentation".to_string(),
            document_title: "Extracted Slides Data".to_string(),
            image_width_inches: 5.5,
            open_delay_ms: 5000,
            advance_delay_ms: 3000,
            settle: SettleStrategy::default(),
            threshold: ThresholdParams::default(),
            browser: BrowserConfig::default(),
            tools: ToolPaths::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("total_slides", &self.total_slides)
            .field("work_dir", &self.work_dir)
            .field("screenshot_dir_name", &self.screenshot_dir_name)
            .field("output_stem", &self.output_stem)
            .field("image_width_inches", &self.image_width_inches)
            .field("open_delay_ms", &self.open_delay_ms)
            .field("advance_delay_ms", &self.advance_delay_ms)
            .field("settle", &self.settle)
            .field("threshold", &self.threshold)
            .field("browser", &self.browser)
            .field("tools", &self.tools)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CaptureProgressCallback>"),
            )
            .finish()
    }
}

impl CaptureConfig {
    /// Create a new builder for `CaptureConfig`.
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reopen this configuration for editing; `build()` re-validates it.
    pub fn into_builder(self) -> CaptureConfigBuilder {
        CaptureConfigBuilder { config: self }
    }

    /// Directory holding the per-slide screenshots.
    pub fn screenshot_dir(&self) -> PathBuf {
        self.work_dir.join(&self.screenshot_dir_name)
    }

    /// Path of the screenshot for a 1-based slide index.
    pub fn screenshot_path(&self, index: usize) -> PathBuf {
        screenshot_path_in(&self.screenshot_dir(), index)
    }

    /// Path of the generated `.docx` document.
    pub fn document_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.docx", self.output_stem))
    }
}

/// `slide_{index}.png` inside `dir`.
pub fn screenshot_path_in(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("slide_{index}.png"))
}

/// Builder for [`CaptureConfig`].
#[derive(Debug)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    /// Slide count; validated (not clamped) by [`Self::build`].
    pub fn total_slides(mut self, n: usize) -> Self {
        self.config.total_slides = n;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn screenshot_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.screenshot_dir_name = name.into();
        self
    }

    pub fn output_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.output_stem = stem.into();
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.config.document_title = title.into();
        self
    }

    pub fn image_width_inches(mut self, inches: f32) -> Self {
        self.config.image_width_inches = inches;
        self
    }

    pub fn open_delay_ms(mut self, ms: u64) -> Self {
        self.config.open_delay_ms = ms;
        self
    }

    pub fn advance_delay_ms(mut self, ms: u64) -> Self {
        self.config.advance_delay_ms = ms;
        self
    }

    pub fn settle(mut self, strategy: SettleStrategy) -> Self {
        self.config.settle = strategy;
        self
    }

    pub fn threshold(mut self, params: ThresholdParams) -> Self {
        self.config.threshold = params;
        self
    }

    pub fn browser(mut self, browser: BrowserConfig) -> Self {
        self.config.browser = browser;
        self
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptureConfig, CaptureError> {
        let c = &self.config;
        if !(MIN_SLIDES..=MAX_SLIDES).contains(&c.total_slides) {
            return Err(CaptureError::InvalidConfig(format!(
                "Slide count must be {MIN_SLIDES}–{MAX_SLIDES}, got {}",
                c.total_slides
            )));
        }
        c.threshold.validate()?;
        if !(c.image_width_inches.is_finite() && c.image_width_inches > 0.0) {
            return Err(CaptureError::InvalidConfig(format!(
                "Image width must be a positive number of inches, got {}",
                c.image_width_inches
            )));
        }
        if c.output_stem.trim().is_empty() || c.screenshot_dir_name.trim().is_empty() {
            return Err(CaptureError::InvalidConfig(
                "Output stem and screenshot directory name must not be empty".into(),
            ));
        }
        if let SettleStrategy::Stable { poll_interval_ms, .. } = c.settle {
            if poll_interval_ms == 0 {
                return Err(CaptureError::InvalidConfig(
                    "Settle poll interval must be ≥ 1 ms".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Sub-configs ──────────────────────────────────────────────────────────

/// How the browser controller waits for a slide to finish rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleStrategy {
    /// Sleep for the full step delay.
    Fixed,
    /// Poll screenshots every `poll_interval_ms` until two consecutive ones
    /// are identical, giving up when the step delay has elapsed. (default)
    ///
    /// A match only counts once `min_wait_ms` has passed, and after a key
    /// press only once the page has changed from the last captured frame.
    Stable {
        poll_interval_ms: u64,
        /// Floor on every settle wait (capped by the step delay). Default: 1000.
        #[serde(default = "default_min_wait_ms")]
        min_wait_ms: u64,
    },
}

fn default_min_wait_ms() -> u64 {
    1000
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Stable {
            poll_interval_ms: 500,
            min_wait_ms: default_min_wait_ms(),
        }
    }
}

/// Adaptive Gaussian threshold parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    /// Neighbourhood size in pixels; odd, ≥ 3. Default: 11.
    pub block_size: u32,
    /// Constant subtracted from the weighted neighbourhood mean. Default: 2.
    pub offset: i32,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            block_size: 11,
            offset: 2,
        }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "Threshold block size must be odd and ≥ 3, got {}",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// WebDriver / Chrome settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Connect to this already-running WebDriver endpoint instead of
    /// spawning `driver_path`.
    pub webdriver_url: Option<String>,
    /// WebDriver executable to spawn. Default: `chromedriver`.
    pub driver_path: PathBuf,
    /// Port the spawned driver listens on. Default: 9515.
    pub driver_port: u16,
    /// How long to wait for the driver's `/status` to report ready. Default: 10.
    pub driver_startup_timeout_secs: u64,
    /// Run Chrome without a window. Default: true.
    pub headless: bool,
    /// Browser viewport size in pixels. Default: 1920×1080.
    pub window_size: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: None,
            driver_path: PathBuf::from("chromedriver"),
            driver_port: 9515,
            driver_startup_timeout_secs: 10,
            headless: true,
            window_size: (1920, 1080),
        }
    }
}

/// Locations of the external tools the pipeline shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Tesseract executable. Default: `tesseract`.
    pub tesseract: PathBuf,
    /// LibreOffice executable used for DOCX → PDF. Default: `soffice`.
    pub soffice: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tesseract: PathBuf::from("tesseract"),
            soffice: PathBuf::from("soffice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_behaviour() {
        let c = CaptureConfig::default();
        assert_eq!(c.total_slides, 10);
        assert_eq!(c.open_delay_ms, 5000);
        assert_eq!(c.advance_delay_ms, 3000);
        assert_eq!(c.threshold, ThresholdParams { block_size: 11, offset: 2 });
        assert_eq!(c.image_width_inches, 5.5);
        assert_eq!(c.document_title, "Extracted Slides Data");
    }

    #[test]
    fn file_layout() {
        let c = CaptureConfig::builder().work_dir("/w").build().unwrap();
        assert_eq!(c.screenshot_dir(), PathBuf::from("/w/slides_images"));
        assert_eq!(
            c.screenshot_path(3),
            PathBuf::from("/w/slides_images/slide_3.png")
        );
        assert_eq!(
            c.document_path(),
            PathBuf::from("/w/Extracted_Presentation.docx")
        );
    }

    #[test]
    fn slide_count_bounds() {
        assert!(CaptureConfig::builder().total_slides(1).build().is_ok());
        assert!(CaptureConfig::builder().total_slides(100).build().is_ok());
        assert!(CaptureConfig::builder().total_slides(0).build().is_err());
        assert!(CaptureConfig::builder().total_slides(101).build().is_err());
    }

    #[test]
    fn even_block_size_rejected() {
        let err = CaptureConfig::builder()
            .threshold(ThresholdParams { block_size: 10, offset: 2 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("block size"), "got: {err}");
    }

    #[test]
    fn zero_poll_interval_rejected() {
        assert!(CaptureConfig::builder()
            .settle(SettleStrategy::Stable {
                poll_interval_ms: 0,
                min_wait_ms: 0,
            })
            .build()
            .is_err());
        assert!(CaptureConfig::builder()
            .settle(SettleStrategy::Fixed)
            .build()
            .is_ok());
    }

    #[test]
    fn settle_min_wait_defaults_when_omitted() {
        let s: SettleStrategy =
            serde_json::from_str(r#"{"Stable":{"poll_interval_ms":250}}"#).unwrap();
        assert_eq!(
            s,
            SettleStrategy::Stable {
                poll_interval_ms: 250,
                min_wait_ms: 1000,
            }
        );
    }

    #[test]
    fn non_positive_width_rejected() {
        assert!(CaptureConfig::builder()
            .image_width_inches(0.0)
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_callback() {
        use crate::progress::NoopProgressCallback;
        use std::sync::Arc;
        let c = CaptureConfig::builder()
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn CaptureProgressCallback>"));
    }
}
