//! CLI binary for slide-capture.
//!
//! A thin shim over the library crate: `serve` mounts the web UI, `extract`
//! runs a single extraction in the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use slide_capture::{
    cleanup_artifacts, extract, serve, BrowserConfig, CaptureConfig, CaptureProgressCallback,
    OutputFiles, ProgressCallback, RunOutcome, SettleStrategy, ShellConfig, SlideRecord, StopFlag,
    ThresholdParams, ToolPaths,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the browser opens the deck, then a slide counter bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening presentation…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CaptureProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_slides: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_slides as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Capturing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_slides} slides…"))
        ));
    }

    fn on_slide_start(&self, index: usize, _total_slides: usize) {
        self.bar.set_message(format!("slide {index}"));
    }

    fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
        let preview: String = slide.text.chars().take(48).collect();
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}  {}",
            green("✓"),
            slide.index,
            total_slides,
            dim(&format!("{:>5} chars", slide.text.len())),
            dim(&format!("{:.1}s", slide.duration_ms as f64 / 1000.0)),
            dim(&preview),
        ));
        self.bar.inc(1);
    }

    fn on_stopped(&self, completed: usize, total_slides: usize) {
        self.bar.println(format!(
            "{} Stopped after {completed}/{total_slides} slides",
            yellow("■")
        ));
    }

    fn on_run_complete(&self, outcome: RunOutcome, files: Option<&OutputFiles>) {
        self.bar.finish_and_clear();
        let mark = match outcome {
            RunOutcome::Completed => green("✔"),
            RunOutcome::Stopped => yellow("■"),
        };
        match files {
            Some(files) => eprintln!(
                "{} {}  {}",
                mark,
                bold(&files.document.display().to_string()),
                bold(&files.pdf.display().to_string()),
            ),
            None => eprintln!("{mark} No slides captured"),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the web UI on http://127.0.0.1:8501
  slide-capture serve

  # Extract 12 slides from the terminal
  slide-capture extract https://prezi.com/view/abc123 --slides 12

  # Watch the browser work, fixed delays instead of screenshot polling
  slide-capture extract https://example.com/deck --show-browser --settle fixed

  # Use a WebDriver that is already running
  slide-capture extract https://example.com/deck --webdriver-url http://localhost:4444

REQUIREMENTS:
  chromedriver + Chrome   browser automation
  tesseract               OCR
  soffice (LibreOffice)   DOCX → PDF conversion

ENVIRONMENT VARIABLES:
  RUST_LOG                       Log filter (overrides --verbose/--quiet)
  SLIDE_CAPTURE_WORK_DIR         Where screenshots and outputs are written
  SLIDE_CAPTURE_CHROMEDRIVER     chromedriver executable
  SLIDE_CAPTURE_WEBDRIVER_URL    Existing WebDriver endpoint
  SLIDE_CAPTURE_TESSERACT        tesseract executable
  SLIDE_CAPTURE_SOFFICE          soffice executable
"#;

/// Capture web slide presentations into DOCX and PDF.
#[derive(Parser, Debug)]
#[command(
    name = "slide-capture",
    version,
    about = "Screenshot and OCR every slide of a web presentation into DOCX and PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SLIDE_CAPTURE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SLIDE_CAPTURE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web UI.
    Serve {
        /// Listen address.
        #[arg(long, env = "SLIDE_CAPTURE_BIND", default_value = "127.0.0.1:8501")]
        bind: SocketAddr,

        /// Seconds between offering downloads and deleting the files.
        #[arg(long, env = "SLIDE_CAPTURE_CLEANUP_GRACE", default_value_t = 0)]
        cleanup_grace: u64,

        #[command(flatten)]
        capture: CaptureArgs,
    },
    /// Extract one presentation from the terminal.
    Extract {
        /// Presentation URL (http or https).
        url: String,

        /// Number of slides to capture (1–100).
        #[arg(short = 'n', long, env = "SLIDE_CAPTURE_SLIDES", default_value_t = 10,
              value_parser = clap::value_parser!(u16).range(1..=100))]
        slides: u16,

        /// Delete screenshots and outputs when done.
        #[arg(long)]
        cleanup: bool,

        /// Print the result as JSON on stdout.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        capture: CaptureArgs,
    },
}

/// Options shared by both subcommands.
#[derive(Args, Debug, Clone)]
struct CaptureArgs {
    /// Directory for screenshots and output files.
    #[arg(long, env = "SLIDE_CAPTURE_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Output file stem (`<stem>.docx`, `<stem>.pdf`).
    #[arg(long, env = "SLIDE_CAPTURE_OUTPUT_STEM", default_value = "Extracted_Presentation")]
    output_stem: String,

    /// Show the browser window instead of running headless.
    #[arg(long, env = "SLIDE_CAPTURE_SHOW_BROWSER")]
    show_browser: bool,

    /// chromedriver executable to spawn.
    #[arg(long, env = "SLIDE_CAPTURE_CHROMEDRIVER", default_value = "chromedriver")]
    chromedriver: PathBuf,

    /// Port for the spawned chromedriver.
    #[arg(long, env = "SLIDE_CAPTURE_DRIVER_PORT", default_value_t = 9515)]
    driver_port: u16,

    /// Use this running WebDriver endpoint instead of spawning chromedriver.
    #[arg(long, env = "SLIDE_CAPTURE_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// tesseract executable.
    #[arg(long, env = "SLIDE_CAPTURE_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// LibreOffice executable.
    #[arg(long, env = "SLIDE_CAPTURE_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// How to wait for a slide to render.
    #[arg(long, env = "SLIDE_CAPTURE_SETTLE", value_enum, default_value = "stable")]
    settle: SettleArg,

    /// Minimum wait before a `stable` page counts as settled, in milliseconds.
    #[arg(long, env = "SLIDE_CAPTURE_SETTLE_MIN_WAIT", default_value_t = 1000)]
    settle_min_wait_ms: u64,

    /// Wait after opening the presentation, in milliseconds.
    #[arg(long, env = "SLIDE_CAPTURE_OPEN_DELAY", default_value_t = 5000)]
    open_delay_ms: u64,

    /// Wait after each arrow key, in milliseconds.
    #[arg(long, env = "SLIDE_CAPTURE_ADVANCE_DELAY", default_value_t = 3000)]
    advance_delay_ms: u64,

    /// Adaptive threshold neighbourhood size (odd, ≥ 3).
    #[arg(long, env = "SLIDE_CAPTURE_BLOCK_SIZE", default_value_t = 11)]
    block_size: u32,

    /// Adaptive threshold offset.
    #[arg(long, env = "SLIDE_CAPTURE_THRESHOLD_OFFSET", default_value_t = 2, allow_hyphen_values = true)]
    threshold_offset: i32,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SettleArg {
    Fixed,
    Stable,
}

impl SettleArg {
    fn strategy(self, min_wait_ms: u64) -> SettleStrategy {
        match self {
            SettleArg::Fixed => SettleStrategy::Fixed,
            SettleArg::Stable => SettleStrategy::Stable {
                poll_interval_ms: 500,
                min_wait_ms,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for `extract` unless --verbose.
    let show_progress = !cli.quiet && matches!(cli.command, Command::Extract { json: false, .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            bind,
            cleanup_grace,
            capture,
        } => {
            let config = ShellConfig {
                bind,
                cleanup_grace_secs: cleanup_grace,
                capture: build_config(&capture, 10, None)?,
                ..ShellConfig::default()
            };
            if !cli.quiet {
                eprintln!("{} Slide capture UI on {}", cyan("◆"), bold(&format!("http://{bind}")));
            }
            serve(config).await.context("Web UI failed")?;
        }
        Command::Extract {
            url,
            slides,
            cleanup,
            json,
            capture,
        } => {
            let progress: Option<ProgressCallback> = if show_progress && !cli.verbose {
                Some(CliProgressCallback::new() as Arc<dyn CaptureProgressCallback>)
            } else {
                None
            };
            let config = build_config(&capture, slides as usize, progress)?;

            // ── Ctrl-C → stop after the current slide ──────────────────────
            let stop = StopFlag::new();
            let on_signal = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("{} Stopping after the current slide…", yellow("■"));
                    on_signal.stop();
                }
            });

            let output = extract(&url, &config, &stop)
                .await
                .context("Extraction failed")?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                eprintln!(
                    "   {}/{} slides  {}ms total  {}ms OCR  {}ms PDF",
                    output.stats.captured_slides,
                    output.stats.requested_slides,
                    output.stats.total_duration_ms,
                    dim(&output.stats.ocr_duration_ms.to_string()),
                    dim(&output.stats.pdf_duration_ms.to_string()),
                );
            }

            if cleanup {
                cleanup_artifacts(&config, output.files.as_ref())
                    .await
                    .context("Cleanup failed")?;
            }
        }
    }

    Ok(())
}

/// Map CLI args to `CaptureConfig`.
fn build_config(
    args: &CaptureArgs,
    total_slides: usize,
    progress: Option<ProgressCallback>,
) -> Result<CaptureConfig> {
    let browser = BrowserConfig {
        webdriver_url: args.webdriver_url.clone(),
        driver_path: args.chromedriver.clone(),
        driver_port: args.driver_port,
        headless: !args.show_browser,
        ..BrowserConfig::default()
    };

    let mut builder = CaptureConfig::builder()
        .total_slides(total_slides)
        .work_dir(&args.work_dir)
        .output_stem(&args.output_stem)
        .settle(args.settle.strategy(args.settle_min_wait_ms))
        .open_delay_ms(args.open_delay_ms)
        .advance_delay_ms(args.advance_delay_ms)
        .threshold(ThresholdParams {
            block_size: args.block_size,
            offset: args.threshold_offset,
        })
        .browser(browser)
        .tools(ToolPaths {
            tesseract: args.tesseract.clone(),
            soffice: args.soffice.clone(),
        });

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
