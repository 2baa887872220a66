//! Web UI shell: start/stop controls, live progress, downloads.
//!
//! A single-page UI talks to a small JSON/SSE API:
//!
//! | Method | Path                  | Purpose                                  |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/`                   | the UI                                   |
//! | POST   | `/api/start`          | launch a run (`{url, total_slides, email}`) |
//! | POST   | `/api/stop`           | set the active run's stop flag           |
//! | GET    | `/api/status`         | current [`RunState`] and progress        |
//! | GET    | `/api/events`         | [`CaptureEvent`] stream (Server-Sent Events) |
//! | GET    | `/slides/{index}`     | a captured screenshot                    |
//! | GET    | `/download/{kind}`    | `document` or `pdf`                      |
//!
//! Runs execute as background tasks, one at a time. When a run finishes the
//! download links are announced and then, after `cleanup_grace_secs`
//! (default 0), the screenshots and both output files are deleted. A
//! download that arrives after cleanup gets 404: the links are offered and
//! removed back to back, and that ordering is kept as-is.
//!
//! A run's cleanup belongs to that run's task. Starting a new run while the
//! previous one is still inside its grace period cancels the pending wait
//! and cleans up immediately, before the new run writes anything.

use crate::capture::{cleanup_artifacts, extract, validate_url};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::events::{progress_fraction, CaptureEvent, EventSink};
use crate::output::{CaptureOutput, OutputFiles, RunState, SlideRecord};
use crate::progress::{CaptureProgressCallback, StopFlag};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::BoxFuture;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

const INDEX_HTML: &str = include_str!("index.html");

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Starts one extraction run. The default launches the real collaborators
/// through [`extract`]; tests substitute their own.
pub type Launcher = Arc<dyn Fn(String, CaptureConfig, StopFlag) -> LaunchFuture + Send + Sync>;

/// What a [`Launcher`] returns.
pub type LaunchFuture = BoxFuture<'static, Result<CaptureOutput, CaptureError>>;

/// The production launcher.
pub fn default_launcher() -> Launcher {
    Arc::new(|url: String, config: CaptureConfig, stop: StopFlag| -> LaunchFuture {
        Box::pin(async move { extract(&url, &config, &stop).await })
    })
}

/// Settings for the web shell.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Listen address. Default: `127.0.0.1:8501`.
    pub bind: SocketAddr,
    /// Delay between announcing downloads and deleting the files. Default: 0.
    pub cleanup_grace_secs: u64,
    /// Template for every run; `total_slides` is replaced per request.
    pub capture: CaptureConfig,
    /// Buffered events per SSE subscriber before it starts missing some.
    pub event_capacity: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            cleanup_grace_secs: 0,
            capture: CaptureConfig::default(),
            event_capacity: 256,
        }
    }
}

// ── State ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RunSlot {
    state: RunState,
    stop: Option<StopFlag>,
    completed: usize,
    total_slides: usize,
    files: Option<OutputFiles>,
    last_error: Option<String>,
    /// Task of the latest run, including its delayed cleanup.
    task: Option<JoinHandle<()>>,
}

struct Shell {
    config: ShellConfig,
    launcher: Launcher,
    sink: EventSink,
    run: Mutex<RunSlot>,
}

impl Shell {
    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> StatusResponse {
        let slot = self.slot();
        let downloads = slot.files.is_some() && slot.state.is_finished();
        StatusResponse {
            state: slot.state,
            completed: slot.completed,
            total_slides: slot.total_slides,
            progress: progress_fraction(slot.completed, slot.total_slides),
            last_error: slot.last_error.clone(),
            document_url: downloads.then(|| download_url(DownloadKind::Document)),
            pdf_url: downloads.then(|| download_url(DownloadKind::Pdf)),
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    shell: Arc<Shell>,
}

impl AppState {
    pub fn new(config: ShellConfig, launcher: Launcher) -> Self {
        let (tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shell: Arc::new(Shell {
                config,
                launcher,
                sink: EventSink::new(tx),
                run: Mutex::new(RunSlot::default()),
            }),
        }
    }

    /// Subscribe to run events without going through HTTP.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.shell.sink.subscribe()
    }

    /// Stop the active run, if any. Returns whether one was running.
    pub fn stop_active(&self) -> bool {
        let slot = self.shell.slot();
        match (&slot.state, &slot.stop) {
            (RunState::Running, Some(stop)) => {
                stop.stop();
                true
            }
            _ => false,
        }
    }
}

/// Body of `POST /api/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub url: String,
    #[serde(default = "default_total_slides")]
    pub total_slides: usize,
    /// Collected for parity with the form; nothing is ever sent to it.
    #[serde(default)]
    pub email: Option<String>,
}

fn default_total_slides() -> usize {
    10
}

/// Body of `GET /api/status` and of start/stop responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: RunState,
    pub completed: usize,
    pub total_slides: usize,
    pub progress: f32,
    pub last_error: Option<String>,
    pub document_url: Option<String>,
    pub pdf_url: Option<String>,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// JSON error response `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the shell's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/start", post(start))
        .route("/api/stop", post(stop))
        .route("/api/status", get(status))
        .route("/api/events", get(events))
        .route("/slides/{index}", get(slide_image))
        .route("/download/{kind}", get(download))
        .with_state(state)
}

/// Bind `config.bind` and serve until Ctrl-C.
pub async fn serve(config: ShellConfig) -> Result<(), CaptureError> {
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|e| CaptureError::Internal(format!("failed to bind {}: {e}", config.bind)))?;
    let state = AppState::new(config, default_launcher());
    let on_shutdown = state.clone();

    let local = listener
        .local_addr()
        .map_err(|e| CaptureError::Internal(e.to_string()))?;
    info!("Slide capture UI on http://{}", local);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() && on_shutdown.stop_active() {
                warn!("Shutting down; active extraction asked to stop");
            }
        })
        .await
        .map_err(|e| CaptureError::Internal(format!("server error: {e}")))
}

/// Serve on an already-bound listener with a custom launcher.
pub async fn serve_on(
    listener: TcpListener,
    config: ShellConfig,
    launcher: Launcher,
) -> Result<(), CaptureError> {
    axum::serve(listener, router(AppState::new(config, launcher)))
        .await
        .map_err(|e| CaptureError::Internal(format!("server error: {e}")))
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.shell.status())
}

async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let url = validate_url(&req.url)?.to_string();
    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        debug!("Email collected (not used): {}", email);
    }

    let shell = Arc::clone(&state.shell);
    let config = shell
        .config
        .capture
        .clone()
        .into_builder()
        .total_slides(req.total_slides)
        .progress_callback(Arc::new(ShellProgress {
            shell: Arc::clone(&shell),
        }))
        .build()?;

    let stop = StopFlag::new();
    let (previous_task, previous_files) = {
        let mut slot = shell.slot();
        if !slot.state.can_transition_to(RunState::Running) {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "an extraction is already running",
            ));
        }
        let previous = std::mem::replace(
            &mut *slot,
            RunSlot {
                state: RunState::Running,
                stop: Some(stop.clone()),
                total_slides: req.total_slides,
                ..RunSlot::default()
            },
        );
        (previous.task, previous.files)
    };

    if let Some(task) = previous_task {
        finish_previous_run(&shell, task, previous_files).await;
    }

    info!("Starting extraction: {} ({} slides)", url, req.total_slides);
    {
        // Held across the spawn: the handle is stored before the run can finish.
        let mut slot = shell.slot();
        slot.task = Some(tokio::spawn(run_extraction(
            Arc::clone(&shell),
            url,
            config,
            stop,
        )));
    }
    Ok((StatusCode::ACCEPTED, Json(shell.status())))
}

/// Cut short the previous run's grace period and delete its artifacts now.
async fn finish_previous_run(shell: &Shell, task: JoinHandle<()>, files: Option<OutputFiles>) {
    if task.is_finished() {
        return;
    }
    task.abort();
    match task.await {
        Err(e) if e.is_cancelled() => {
            debug!("Previous run's cleanup cancelled; cleaning up now");
            match cleanup_artifacts(&shell.config.capture, files.as_ref()).await {
                Ok(()) => shell.sink.send(CaptureEvent::CleanedUp),
                Err(e) => warn!("Cleanup failed: {}", e),
            }
        }
        Err(e) => warn!("Previous run task failed: {}", e),
        Ok(()) => {}
    }
}

async fn stop(State(state): State<AppState>) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    if state.stop_active() {
        info!("Stop requested");
        Ok((StatusCode::ACCEPTED, Json(state.shell.status())))
    } else {
        Err(ApiError::new(StatusCode::CONFLICT, "no extraction is running"))
    }
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.subscribe()).filter_map(|msg| async move {
        match msg {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok),
            Err(lagged) => {
                warn!("SSE subscriber {}", lagged);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn slide_image(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Response, ApiError> {
    let path = state.shell.config.capture.screenshot_path(index);
    let bytes = read_artifact(&path).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

async fn download(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Response, ApiError> {
    let kind = match kind.as_str() {
        "document" => DownloadKind::Document,
        "pdf" => DownloadKind::Pdf,
        other => {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                format!("unknown download '{other}'"),
            ))
        }
    };
    let files = state
        .shell
        .slot()
        .files
        .clone()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no output files available"))?;
    let (path, mime) = match kind {
        DownloadKind::Document => (files.document, DOCX_MIME),
        DownloadKind::Pdf => (files.pdf, "application/pdf"),
    };

    let bytes = read_artifact(&path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Clone, Copy)]
enum DownloadKind {
    Document,
    Pdf,
}

fn download_url(kind: DownloadKind) -> String {
    match kind {
        DownloadKind::Document => "/download/document".to_string(),
        DownloadKind::Pdf => "/download/pdf".to_string(),
    }
}

async fn read_artifact(path: &std::path::Path) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::new(StatusCode::NOT_FOUND, format!("{} no longer exists", path.display()))
        } else {
            ApiError::from(CaptureError::io(path, e))
        }
    })
}

// ── Background run ───────────────────────────────────────────────────────

/// Progress callback that keeps the status slot current and forwards events.
struct ShellProgress {
    shell: Arc<Shell>,
}

impl CaptureProgressCallback for ShellProgress {
    fn on_run_start(&self, total_slides: usize) {
        self.shell.sink.on_run_start(total_slides);
    }

    fn on_slide_complete(&self, slide: &SlideRecord, total_slides: usize) {
        self.shell.slot().completed = slide.index;
        self.shell.sink.on_slide_complete(slide, total_slides);
    }

    fn on_stopped(&self, completed: usize, total_slides: usize) {
        self.shell.sink.on_stopped(completed, total_slides);
    }
}

async fn run_extraction(shell: Arc<Shell>, url: String, config: CaptureConfig, stop: StopFlag) {
    let result = (shell.launcher)(url, config.clone(), stop).await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            error!("Extraction failed: {}", e);
            {
                let mut slot = shell.slot();
                slot.state = RunState::Idle;
                slot.stop = None;
                slot.last_error = Some(e.to_string());
            }
            shell.sink.send(CaptureEvent::Failed {
                message: e.to_string(),
            });
            return;
        }
    };

    let has_files = output.files.is_some();
    {
        let mut slot = shell.slot();
        slot.state = output.outcome.into();
        slot.stop = None;
        slot.completed = output.slides.len();
        slot.files = output.files.clone();
    }
    shell.sink.send(CaptureEvent::Finished {
        outcome: output.outcome,
        captured: output.slides.len(),
        document_url: has_files.then(|| download_url(DownloadKind::Document)),
        pdf_url: has_files.then(|| download_url(DownloadKind::Pdf)),
    });

    if shell.config.cleanup_grace_secs > 0 {
        tokio::time::sleep(Duration::from_secs(shell.config.cleanup_grace_secs)).await;
    }
    match cleanup_artifacts(&config, output.files.as_ref()).await {
        Ok(()) => shell.sink.send(CaptureEvent::CleanedUp),
        Err(e) => warn!("Cleanup failed: {}", e),
    }
}
