//! Browser control: open the presentation, screenshot it, page forward.
//!
//! Two layers:
//!
//! * [`SlideBrowser`] is the raw capability set the pipeline needs from a
//!   remote-controlled browser: navigate, screenshot, press "next", quit.
//!   [`WebDriverBrowser`] implements it over WebDriver (chromedriver +
//!   Chrome) with the `fantoccini` client.
//! * [`SlideController`] adds the timing contract on top: after opening the
//!   presentation and after every key press it waits for the slide to settle
//!   according to [`SettleStrategy`].
//!
//! ## Settling
//!
//! Remote presentations animate between slides and give no "render done"
//! event. [`SettleStrategy::Stable`] polls screenshots and returns as soon
//! as two consecutive frames are byte-identical, never waiting longer than
//! the step's delay. If a poll screenshot fails, the rest of the delay is
//! slept out as a plain fixed wait.

use crate::config::{BrowserConfig, SettleStrategy};
use crate::error::CaptureError;
use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// Raw browser capabilities used by the pipeline.
pub trait SlideBrowser: Send {
    /// Load `url` in the current tab.
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), CaptureError>> + Send;

    /// PNG screenshot of the current viewport.
    fn screenshot(&mut self) -> impl Future<Output = Result<Vec<u8>, CaptureError>> + Send;

    /// Send the "next slide" key (ArrowRight) to the page body.
    fn press_next(&mut self) -> impl Future<Output = Result<(), CaptureError>> + Send;

    /// End the session and terminate the browser process.
    fn close(&mut self) -> impl Future<Output = Result<(), CaptureError>> + Send;
}

/// How a settle wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Two consecutive screenshots matched.
    Stable,
    /// The step delay ran out before the page stopped changing.
    TimedOut,
    /// A plain sleep was used (strategy `Fixed`, or a poll screenshot failed).
    Fixed,
}

/// Timing wrapper implementing `open` / `capture` / `advance`.
pub struct SlideController<'a, B: SlideBrowser> {
    browser: &'a mut B,
    settle: SettleStrategy,
    open_delay: Duration,
    advance_delay: Duration,
    /// Bytes of the last frame written by `capture`.
    last_capture: Option<Vec<u8>>,
}

impl<'a, B: SlideBrowser> SlideController<'a, B> {
    pub fn new(
        browser: &'a mut B,
        settle: SettleStrategy,
        open_delay: Duration,
        advance_delay: Duration,
    ) -> Self {
        Self {
            browser,
            settle,
            open_delay,
            advance_delay,
            last_capture: None,
        }
    }

    /// Navigate to `url` and wait for the first slide to settle.
    pub async fn open(&mut self, url: &str) -> Result<Settled, CaptureError> {
        info!("Opening presentation: {}", url);
        self.browser.navigate(url).await?;
        self.wait_settled(self.open_delay, None).await
    }

    /// Write the current viewport to `path` as PNG.
    pub async fn capture(&mut self, path: &Path) -> Result<(), CaptureError> {
        let png = self.browser.screenshot().await?;
        tokio::fs::write(path, &png)
            .await
            .map_err(|e| CaptureError::io(path, e))?;
        debug!("Captured {} ({} bytes)", path.display(), png.len());
        self.last_capture = Some(png);
        Ok(())
    }

    /// Press "next" and wait for the following slide to settle.
    ///
    /// With [`SettleStrategy::Stable`] the page must first differ from the
    /// frame last written by [`Self::capture`].
    pub async fn advance(&mut self) -> Result<Settled, CaptureError> {
        let before = self.last_capture.take();
        self.browser.press_next().await?;
        self.wait_settled(self.advance_delay, before).await
    }

    async fn wait_settled(
        &mut self,
        budget: Duration,
        before: Option<Vec<u8>>,
    ) -> Result<Settled, CaptureError> {
        let (poll, min_wait) = match self.settle {
            SettleStrategy::Fixed => {
                sleep(budget).await;
                return Ok(Settled::Fixed);
            }
            SettleStrategy::Stable {
                poll_interval_ms,
                min_wait_ms,
            } => (
                Duration::from_millis(poll_interval_ms),
                Duration::from_millis(min_wait_ms),
            ),
        };

        let start = Instant::now();
        let deadline = start + budget;
        let earliest = start + min_wait.min(budget);
        let mut changed = before.is_none();
        let mut previous: Option<Vec<u8>> = None;
        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!("Slide did not settle within {:?}", budget);
                return Ok(Settled::TimedOut);
            }
            sleep(poll.min(deadline - now)).await;

            match self.browser.screenshot().await {
                Ok(frame) => {
                    if !changed && before.as_deref() != Some(frame.as_slice()) {
                        changed = true;
                    }
                    if changed
                        && Instant::now() >= earliest
                        && previous.as_deref() == Some(frame.as_slice())
                    {
                        return Ok(Settled::Stable);
                    }
                    previous = Some(frame);
                }
                Err(e) => {
                    warn!("Settle poll failed ({}); falling back to fixed delay", e);
                    sleep_until(deadline).await;
                    return Ok(Settled::Fixed);
                }
            }
        }
    }
}

// ── WebDriver implementation ─────────────────────────────────────────────

/// A Chrome session driven over WebDriver.
///
/// Unless [`BrowserConfig::webdriver_url`] points at a running server, the
/// driver binary is spawned here and killed on [`SlideBrowser::close`] or
/// when the value is dropped.
pub struct WebDriverBrowser {
    client: Option<Client>,
    driver: Option<Child>,
}

impl WebDriverBrowser {
    /// Start (or connect to) a WebDriver server and open a Chrome session.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, CaptureError> {
        let (url, driver) = match &config.webdriver_url {
            Some(url) => (url.trim_end_matches('/').to_string(), None),
            None => {
                let child = Command::new(&config.driver_path)
                    .arg(format!("--port={}", config.driver_port))
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| CaptureError::DriverLaunch {
                        driver: config.driver_path.display().to_string(),
                        source: e,
                    })?;
                let url = format!("http://127.0.0.1:{}", config.driver_port);
                wait_for_driver(&url, config.driver_startup_timeout_secs).await?;
                (url, Some(child))
            }
        };

        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(config));
        let client = builder
            .connect(&url)
            .await
            .map_err(|e| CaptureError::Session {
                url: url.clone(),
                detail: e.to_string(),
            })?;

        info!(
            "Browser session open on {} (headless: {})",
            url, config.headless
        );
        Ok(Self {
            client: Some(client),
            driver,
        })
    }

    fn client(&self, command: &'static str) -> Result<&Client, CaptureError> {
        self.client.as_ref().ok_or(CaptureError::Browser {
            command,
            detail: "session already closed".into(),
        })
    }
}

fn command_failed(command: &'static str) -> impl FnOnce(fantoccini::error::CmdError) -> CaptureError {
    move |e| CaptureError::Browser {
        command,
        detail: e.to_string(),
    }
}

impl SlideBrowser for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), CaptureError> {
        self.client("navigate")?
            .goto(url)
            .await
            .map_err(command_failed("navigate"))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.client("screenshot")?
            .screenshot()
            .await
            .map_err(command_failed("screenshot"))
    }

    async fn press_next(&mut self) -> Result<(), CaptureError> {
        let body = self
            .client("send_keys")?
            .find(Locator::Css("body"))
            .await
            .map_err(command_failed("find body"))?;
        body.send_keys(&char::from(Key::Right).to_string())
            .await
            .map_err(command_failed("send_keys"))
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        let quit = match self.client.take() {
            Some(client) => client.close().await.map_err(command_failed("quit")),
            None => Ok(()),
        };
        if let Some(mut child) = self.driver.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop WebDriver process: {}", e);
            }
        }
        debug!("Browser session closed");
        quit
    }
}

/// W3C capabilities for a Chrome session.
pub fn chrome_capabilities(config: &BrowserConfig) -> serde_json::Map<String, serde_json::Value> {
    let (w, h) = config.window_size;
    let mut args = vec![format!("--window-size={w},{h}")];
    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert("browserName".into(), json!("chrome"));
    caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
    caps
}

/// Poll `GET {url}/status` until the driver reports ready.
async fn wait_for_driver(url: &str, timeout_secs: u64) -> Result<(), CaptureError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
        .map_err(|e| CaptureError::Internal(format!("HTTP client: {e}")))?;
    let status_url = format!("{url}/status");
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    while Instant::now() < deadline {
        if let Ok(resp) = client.get(&status_url).send().await {
            if resp.status().is_success() {
                let ready = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|v| v["value"]["ready"].as_bool())
                    .unwrap_or(true);
                if ready {
                    debug!("WebDriver ready at {}", url);
                    return Ok(());
                }
            }
        }
        sleep(Duration::from_millis(200)).await;
    }

    Err(CaptureError::DriverTimeout {
        url: url.to_string(),
        secs: timeout_secs,
    })
}
