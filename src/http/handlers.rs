use super::state::{AppState, CaptureRecord, CaptureStatus};
use crate::controller::{CaptureOutcome, CaptureRequest, PreemptHandle, Understanding};
use crate::error::CaptureError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// Longest capture a client may request
const MAX_CAPTURE_SECS: f64 = 300.0;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdBody {
    pub threshold: f32,
}

#[derive(Debug, Serialize)]
pub struct ThresholdRejected {
    pub error: String,
    /// Value still in effect
    pub threshold: f32,
}

#[derive(Debug, Deserialize)]
pub struct StartCaptureRequest {
    /// VAD sensitivity (default: configured value)
    pub sensitivity: Option<f32>,

    /// Overall deadline in seconds, at most 300 (default: 8)
    pub max_duration_secs: Option<f64>,

    /// One-shot amplitude threshold override
    pub amplitude_threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub capture_id: String,
    pub status: CaptureStatus,
}

#[derive(Debug, Serialize)]
pub struct CaptureStatusResponse {
    pub capture_id: String,
    pub status: CaptureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utterance_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Understanding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /threshold
pub async fn get_threshold(State(state): State<AppState>) -> impl IntoResponse {
    Json(ThresholdBody {
        threshold: state.session().amplitude_threshold().get(),
    })
}

/// PUT /threshold
/// Out-of-range values are rejected and the previous value is kept
pub async fn set_threshold(
    State(state): State<AppState>,
    Json(body): Json<ThresholdBody>,
) -> impl IntoResponse {
    let threshold = state.session().amplitude_threshold();

    match threshold.set(body.threshold) {
        Ok(()) => {
            info!("Amplitude threshold set to {:.3}", body.threshold);
            (
                StatusCode::OK,
                Json(ThresholdBody {
                    threshold: threshold.get(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Rejected amplitude threshold: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ThresholdRejected {
                    error: e.to_string(),
                    threshold: threshold.get(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /captures
/// Start a capture, preempting whichever capture is running
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> impl IntoResponse {
    let sensitivity = req
        .sensitivity
        .unwrap_or(state.session().config().vad.sensitivity);
    if !(sensitivity > 0.0 && sensitivity <= 1.0) {
        return error_response(
            StatusCode::BAD_REQUEST,
            CaptureError::SensitivityOutOfRange(sensitivity).to_string(),
        );
    }

    let max_duration = match req.max_duration_secs {
        Some(secs) if secs > 0.0 && secs <= MAX_CAPTURE_SECS => {
            match Duration::try_from_secs_f64(secs) {
                Ok(duration) => duration,
                Err(e) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("invalid max_duration_secs {}: {}", secs, e),
                    )
                }
            }
        }
        Some(secs) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!(
                    "max_duration_secs must be in (0, {}], got {}",
                    MAX_CAPTURE_SECS, secs
                ),
            )
        }
        None => state.default_max_duration,
    };

    if let Some(value) = req.amplitude_threshold {
        if !(0.0..=1.0).contains(&value) {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("amplitude_threshold {} outside [0, 1]", value),
            );
        }
    }

    let request = CaptureRequest {
        sensitivity,
        max_duration,
        amplitude_threshold: req.amplitude_threshold,
    };
    let capture_id = format!("capture-{}", uuid::Uuid::new_v4());
    let preempt = PreemptHandle::new();

    // Goal preemption: the newest request wins
    {
        let mut active = state.active.lock().await;
        if let Some((previous_id, previous)) = active.take() {
            info!("Preempting capture {} for {}", previous_id, capture_id);
            previous.preempt();
        }
        *active = Some((capture_id.clone(), preempt.clone()));
    }

    state
        .captures
        .write()
        .await
        .insert(capture_id.clone(), CaptureRecord::running(preempt.clone()));

    tokio::spawn(run_capture(
        state.clone(),
        capture_id.clone(),
        request,
        preempt,
    ));

    (
        StatusCode::ACCEPTED,
        Json(StartCaptureResponse {
            capture_id,
            status: CaptureStatus::Running,
        }),
    )
        .into_response()
}

/// Drive one capture to completion and record the outcome
async fn run_capture(
    state: AppState,
    capture_id: String,
    request: CaptureRequest,
    preempt: PreemptHandle,
) {
    let result = state
        .controller
        .run_once(&capture_id, &request, &preempt)
        .await;

    {
        let mut captures = state.captures.write().await;
        if let Some(record) = captures.get_mut(&capture_id) {
            match &result {
                Ok(outcome) => {
                    record.status = CaptureStatus::from(outcome);
                    record.outcome = Some(outcome.clone());
                }
                Err(e) => {
                    error!("Capture {} failed: {}", capture_id, e);
                    record.status = CaptureStatus::Failed;
                    record.error = Some(e.to_string());
                }
            }
        }
    }

    {
        let mut active = state.active.lock().await;
        if matches!(active.as_ref(), Some((id, _)) if *id == capture_id) {
            *active = None;
        }
    }

    if let (Some(nats), Ok(outcome)) = (&state.nats, &result) {
        if let Err(e) = nats.publish_result(&capture_id, outcome).await {
            error!("Failed to publish result for {}: {:#}", capture_id, e);
        }
    }
}

/// GET /captures/:capture_id
pub async fn get_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(record) => {
            let (utterance_ms, results) = match &record.outcome {
                Some(CaptureOutcome::Completed {
                    results,
                    utterance_ms,
                })
                | Some(CaptureOutcome::TimedOut {
                    results,
                    utterance_ms,
                }) => (Some(*utterance_ms), Some(results.clone())),
                _ => (None, None),
            };

            (
                StatusCode::OK,
                Json(CaptureStatusResponse {
                    capture_id: capture_id.clone(),
                    status: record.status,
                    utterance_ms,
                    results,
                    error: record.error.clone(),
                }),
            )
                .into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Capture {} not found", capture_id),
        ),
    }
}

/// POST /captures/:capture_id/cancel
pub async fn cancel_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(record) if record.status.is_terminal() => error_response(
            StatusCode::CONFLICT,
            format!("Capture {} already {:?}", capture_id, record.status),
        ),
        Some(record) => {
            info!("Cancelling capture {}", capture_id);
            record.preempt.preempt();
            (
                StatusCode::ACCEPTED,
                Json(StartCaptureResponse {
                    capture_id: capture_id.clone(),
                    status: record.status,
                }),
            )
                .into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Capture {} not found", capture_id),
        ),
    }
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session().snapshot())
}
