// Integration tests for the HTTP control surface
//
// Requests go straight through the router with tower's `oneshot`; no socket
// is bound and no NATS server is needed.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::{FakeTranscriber, FakeUnderstander};
use loqa_capture::controller::{ControllerConfig, SessionController};
use loqa_capture::http::{create_router, AppState};
use loqa_capture::session::RecordingSession;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> (Router, Arc<RecordingSession>) {
    let session = common::session(0.05, Duration::from_secs(10));
    let controller = SessionController::new(
        Arc::clone(&session),
        FakeTranscriber::with_segments(&[("hello", 0.0)]),
        Arc::new(FakeUnderstander::default()),
        ControllerConfig {
            poll_interval: Duration::from_millis(5),
            ..ControllerConfig::default()
        },
    );
    let state = AppState::new(Arc::new(controller));
    (create_router(state), session)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, value))
}

/// Poll a capture until it leaves `running`
async fn wait_for_status(app: &Router, capture_id: &str) -> Result<Value> {
    let uri = format!("/captures/{}", capture_id);
    for _ in 0..200 {
        let (status, body) = send(app, Method::GET, &uri, None).await?;
        assert_eq!(status, StatusCode::OK);
        if body["status"] != "running" {
            return Ok(body);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("capture {} never finished", capture_id)
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_threshold_get_and_put() -> Result<()> {
    let (app, session) = app();

    let (status, body) = send(&app, Method::GET, "/threshold", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!((body["threshold"].as_f64().unwrap() - 0.05).abs() < 1e-6);

    let (status, body) = send(&app, Method::PUT, "/threshold", Some(json!({"threshold": 0.3}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert!((body["threshold"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(session.amplitude_threshold().get(), 0.3);
    Ok(())
}

#[tokio::test]
async fn test_threshold_out_of_range_keeps_previous() -> Result<()> {
    let (app, session) = app();

    let (status, body) = send(&app, Method::PUT, "/threshold", Some(json!({"threshold": 1.5}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!((body["threshold"].as_f64().unwrap() - 0.05).abs() < 1e-6);
    assert!(body["error"].as_str().unwrap().contains("1.5"));
    assert_eq!(session.amplitude_threshold().get(), 0.05);
    Ok(())
}

#[tokio::test]
async fn test_capture_times_out_without_audio() -> Result<()> {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/captures",
        Some(json!({"sensitivity": 0.5, "max_duration_secs": 0.1})),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let capture_id = body["capture_id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "running");

    let body = wait_for_status(&app, &capture_id).await?;
    assert_eq!(body["status"], "timed_out");
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["utterance_ms"], 0);
    Ok(())
}

#[tokio::test]
async fn test_new_capture_preempts_running_one() -> Result<()> {
    let (app, _) = app();

    let (_, first) = send(&app, Method::POST, "/captures", Some(json!({"max_duration_secs": 5.0}))).await?;
    let first_id = first["capture_id"].as_str().unwrap().to_string();

    let (status, second) = send(&app, Method::POST, "/captures", Some(json!({"max_duration_secs": 0.1}))).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let second_id = second["capture_id"].as_str().unwrap().to_string();
    assert_ne!(first_id, second_id);

    let first = wait_for_status(&app, &first_id).await?;
    assert_eq!(first["status"], "preempted");

    let second = wait_for_status(&app, &second_id).await?;
    assert_eq!(second["status"], "timed_out");
    Ok(())
}

#[tokio::test]
async fn test_cancel_capture() -> Result<()> {
    let (app, session) = app();

    let (_, body) = send(&app, Method::POST, "/captures", Some(json!({"max_duration_secs": 5.0}))).await?;
    let capture_id = body["capture_id"].as_str().unwrap().to_string();

    let uri = format!("/captures/{}/cancel", capture_id);
    let (status, _) = send(&app, Method::POST, &uri, None).await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let body = wait_for_status(&app, &capture_id).await?;
    assert_eq!(body["status"], "preempted");
    assert!(body.get("results").is_none());

    // Cancelling a finished capture conflicts
    let (status, _) = send(&app, Method::POST, &uri, None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, snapshot) = send(&app, Method::GET, "/session", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], "idle");
    assert_eq!(session.snapshot().buffered_samples, 0);
    Ok(())
}

#[tokio::test]
async fn test_capture_validation() -> Result<()> {
    let (app, _) = app();

    let (status, _) = send(&app, Method::POST, "/captures", Some(json!({"sensitivity": 1.5}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/captures", Some(json!({"max_duration_secs": -1.0}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/captures",
        Some(json!({"amplitude_threshold": 2.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_unknown_capture() -> Result<()> {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/captures/capture-missing", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("capture-missing"));

    let (status, _) = send(&app, Method::POST, "/captures/capture-missing/cancel", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_session_snapshot() -> Result<()> {
    let (app, _) = app();

    let (status, body) = send(&app, Method::GET, "/session", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["gate_open"], false);
    assert_eq!(body["buffered_samples"], 0);
    Ok(())
}

#[tokio::test]
async fn test_oversized_duration_is_rejected() -> Result<()> {
    let (app, session) = app();

    for secs in [1e19, 1e20, 301.0] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/captures",
            Some(json!({ "max_duration_secs": secs })),
        )
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}s", secs);
        assert!(body["error"].as_str().unwrap().contains("max_duration_secs"));
    }

    // Nothing was started
    assert_eq!(session.state(), loqa_capture::session::SessionState::Idle);

    // The upper bound itself is accepted
    let (status, body) = send(
        &app,
        Method::POST,
        "/captures",
        Some(json!({ "max_duration_secs": 300.0 })),
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    let capture_id = body["capture_id"].as_str().unwrap().to_string();

    let uri = format!("/captures/{}/cancel", capture_id);
    send(&app, Method::POST, &uri, None).await?;
    let body = wait_for_status(&app, &capture_id).await?;
    assert_eq!(body["status"], "preempted");
    Ok(())
}
