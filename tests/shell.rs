//! HTTP tests for the web shell.
//!
//! The server is bound to an ephemeral port and driven with `reqwest`. The
//! extraction itself is a fake launcher that writes placeholder outputs, so
//! no browser or OCR engine is needed.

use reqwest::StatusCode;
use serde_json::{json, Value};
use slide_capture::pipeline::pdf::pdf_path_for;
use slide_capture::server::{serve_on, LaunchFuture, Launcher, StatusResponse};
use slide_capture::{
    CaptureConfig, CaptureError, CaptureOutput, CaptureStats, OutputFiles, RunOutcome, RunState,
    ShellConfig, SlideRecord, StopFlag,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

// ── Fake launcher ────────────────────────────────────────────────────────────

/// Captures every slide instantly, or waits for the stop flag when `hold` is set.
fn fake_launcher(hold: bool) -> Launcher {
    Arc::new(
        move |_url: String, config: CaptureConfig, stop: StopFlag| -> LaunchFuture {
            Box::pin(async move { fake_run(config, stop, hold).await })
        },
    )
}

async fn fake_run(
    config: CaptureConfig,
    stop: StopFlag,
    hold: bool,
) -> Result<CaptureOutput, CaptureError> {
    let total = config.total_slides;
    let cb = config.progress_callback.clone();
    if let Some(cb) = &cb {
        cb.on_run_start(total);
    }

    tokio::fs::create_dir_all(config.screenshot_dir()).await.unwrap();
    let mut slides = Vec::new();
    let mut outcome = RunOutcome::Completed;
    for index in 1..=total {
        if hold {
            while !stop.is_stopped() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
        if stop.is_stopped() {
            outcome = RunOutcome::Stopped;
            if let Some(cb) = &cb {
                cb.on_stopped(slides.len(), total);
            }
            break;
        }
        let image_path = config.screenshot_path(index);
        tokio::fs::write(&image_path, b"png").await.unwrap();
        let record = SlideRecord {
            index,
            text: format!("slide {index}"),
            image_path,
            duration_ms: 0,
        };
        if let Some(cb) = &cb {
            cb.on_slide_complete(&record, total);
        }
        slides.push(record);
    }

    let files = if slides.is_empty() {
        None
    } else {
        let document = config.document_path();
        tokio::fs::write(&document, b"docx").await.unwrap();
        let pdf = pdf_path_for(&document);
        tokio::fs::write(&pdf, b"%PDF").await.unwrap();
        Some(OutputFiles { document, pdf })
    };

    Ok(CaptureOutput {
        outcome,
        stats: CaptureStats {
            requested_slides: total,
            captured_slides: slides.len(),
            ..CaptureStats::default()
        },
        slides,
        files,
    })
}

/// First run is instant. Later runs write slide 1, linger, and fail if the
/// screenshot has been deleted underneath them.
fn lingering_launcher(linger: Duration) -> Launcher {
    let calls = Arc::new(AtomicUsize::new(0));
    Arc::new(
        move |_url: String, config: CaptureConfig, stop: StopFlag| -> LaunchFuture {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            Box::pin(async move {
                if !first {
                    tokio::fs::create_dir_all(config.screenshot_dir()).await.unwrap();
                    let shot = config.screenshot_path(1);
                    tokio::fs::write(&shot, b"png").await.unwrap();
                    tokio::time::sleep(linger).await;
                    if !shot.exists() {
                        return Err(CaptureError::Internal(format!(
                            "{} was deleted mid-run",
                            shot.display()
                        )));
                    }
                }
                fake_run(config, stop, false).await
            })
        },
    )
}

fn failing_launcher() -> Launcher {
    Arc::new(
        |_url: String, _config: CaptureConfig, _stop: StopFlag| -> LaunchFuture {
            Box::pin(async {
                Err(CaptureError::DriverTimeout {
                    url: "http://127.0.0.1:9515".into(),
                    secs: 10,
                })
            })
        },
    )
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn spawn_shell(work_dir: &Path, grace_secs: u64, launcher: Launcher) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ShellConfig {
        bind: addr,
        cleanup_grace_secs: grace_secs,
        capture: CaptureConfig::builder().work_dir(work_dir).build().unwrap(),
        ..ShellConfig::default()
    };
    tokio::spawn(serve_on(listener, config, launcher));
    addr
}

async fn start(client: &reqwest::Client, addr: SocketAddr, body: Value) -> reqwest::Response {
    client
        .post(format!("http://{addr}/api/start"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn status(client: &reqwest::Client, addr: SocketAddr) -> StatusResponse {
    client
        .get(format!("http://{addr}/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll `/api/status` until `done` holds, for at most five seconds.
async fn wait_for(
    client: &reqwest::Client,
    addr: SocketAddr,
    done: impl Fn(&StatusResponse) -> bool,
) -> StatusResponse {
    for _ in 0..500 {
        let s = status(client, addr).await;
        if done(&s) {
            return s;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("status never reached the expected state");
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn index_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 0, fake_launcher(false)).await;

    let body = reqwest::get(format!("http://{addr}/")).await.unwrap().text().await.unwrap();
    assert!(body.contains("Start Extraction"));
    assert!(body.contains("/api/events"));
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 0, fake_launcher(false)).await;
    let client = reqwest::Client::new();

    for body in [
        json!({ "url": "", "total_slides": 3 }),
        json!({ "url": "   ", "total_slides": 3 }),
        json!({ "url": "https://x.test/deck", "total_slides": 0 }),
        json!({ "url": "https://x.test/deck", "total_slides": 101 }),
    ] {
        let resp = start(&client, addr, body.clone()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        let err: Value = resp.json().await.unwrap();
        assert!(err["error"].is_string());
    }
    assert_eq!(status(&client, addr).await.state, RunState::Idle);
}

#[tokio::test]
async fn second_start_while_running_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 30, fake_launcher(true)).await;
    let client = reqwest::Client::new();

    let resp = start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 4 })).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let s: StatusResponse = resp.json().await.unwrap();
    assert_eq!(s.state, RunState::Running);
    assert_eq!(s.total_slides, 4);

    let resp = start(&client, addr, json!({ "url": "https://x.test/other" })).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .post(format!("http://{addr}/api/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let s = wait_for(&client, addr, |s| s.state.is_finished()).await;
    assert_eq!(s.state, RunState::Stopped);
    assert_eq!(s.completed, 0);
    assert!(s.document_url.is_none());
}

#[tokio::test]
async fn stop_without_run_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 0, fake_launcher(false)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn completed_run_offers_downloads_within_grace() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 30, fake_launcher(false)).await;
    let client = reqwest::Client::new();

    let resp = start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 2, "email": "a@b.c" })).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let s = wait_for(&client, addr, |s| s.state == RunState::Completed).await;
    assert_eq!(s.completed, 2);
    assert_eq!(s.progress, 1.0);
    assert_eq!(s.document_url.as_deref(), Some("/download/document"));

    let doc = client
        .get(format!("http://{addr}/download/document"))
        .send()
        .await
        .unwrap();
    assert_eq!(doc.status(), StatusCode::OK);
    let disposition = doc.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("Extracted_Presentation.docx"));
    assert_eq!(doc.bytes().await.unwrap().as_ref(), b"docx");

    let pdf = client.get(format!("http://{addr}/download/pdf")).send().await.unwrap();
    assert_eq!(pdf.status(), StatusCode::OK);
    assert_eq!(pdf.headers()["content-type"], "application/pdf");

    let slide = client.get(format!("http://{addr}/slides/2")).send().await.unwrap();
    assert_eq!(slide.status(), StatusCode::OK);

    let unknown = client.get(format!("http://{addr}/download/zip")).send().await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn downloads_are_gone_after_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 0, fake_launcher(false)).await;
    let client = reqwest::Client::new();

    start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 1 })).await;
    wait_for(&client, addr, |s| s.state == RunState::Completed).await;

    let mut last = StatusCode::OK;
    for _ in 0..200 {
        last = client
            .get(format!("http://{addr}/download/document"))
            .send()
            .await
            .unwrap()
            .status();
        if last == StatusCode::NOT_FOUND {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last, StatusCode::NOT_FOUND);
    assert!(!dir.path().join("Extracted_Presentation.pdf").exists());
    assert!(!dir.path().join("slides_images").exists());

    // A new run may start once the previous one has finished
    let resp = start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 1 })).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn restart_during_grace_keeps_new_run_files() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 1, lingering_launcher(Duration::from_millis(1500))).await;
    let client = reqwest::Client::new();

    start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 1 })).await;
    wait_for(&client, addr, |s| s.state == RunState::Completed).await;

    // The first run's grace period is still pending
    let resp = start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 1 })).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let s = wait_for(&client, addr, |s| s.state != RunState::Running).await;
    assert_eq!(s.last_error, None);
    assert_eq!(s.state, RunState::Completed);
    assert_eq!(s.completed, 1);
    assert!(dir.path().join("Extracted_Presentation.docx").exists());
}

#[tokio::test]
async fn failed_run_returns_to_idle_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_shell(dir.path(), 0, failing_launcher()).await;
    let client = reqwest::Client::new();

    let resp = start(&client, addr, json!({ "url": "https://x.test/deck", "total_slides": 2 })).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let s = wait_for(&client, addr, |s| s.last_error.is_some()).await;
    assert_eq!(s.state, RunState::Idle);
    assert!(s.last_error.unwrap().contains("9515"));
}
