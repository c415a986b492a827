use super::collaborators::Understanding;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parameters of one capture request
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    /// VAD speech-probability threshold for this request
    pub sensitivity: f32,

    /// Overall deadline, measured from arm
    pub max_duration: Duration,

    /// One-shot override of the runtime amplitude threshold
    pub amplitude_threshold: Option<f32>,
}

/// Terminal result of a capture request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Speech ended (or hit the utterance cap) and was processed
    Completed {
        results: Vec<Understanding>,
        utterance_ms: u64,
    },
    /// Deadline passed; whatever was captured was processed
    TimedOut {
        results: Vec<Understanding>,
        utterance_ms: u64,
    },
    /// Cancelled by the caller; nothing was processed
    Preempted,
}

impl CaptureOutcome {
    pub fn results(&self) -> &[Understanding] {
        match self {
            CaptureOutcome::Completed { results, .. } | CaptureOutcome::TimedOut { results, .. } => {
                results
            }
            CaptureOutcome::Preempted => &[],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureOutcome::Completed { .. } => "completed",
            CaptureOutcome::TimedOut { .. } => "timed_out",
            CaptureOutcome::Preempted => "preempted",
        }
    }
}

/// Progress report emitted once per poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFeedback {
    pub capture_id: String,
    pub state: SessionState,
    /// Peak amplitude of the latest window
    pub level: f32,
    pub level_db: f32,
    pub elapsed_ms: u64,
    pub partial_text: Option<String>,
}

/// Cooperative cancellation flag, checked once per poll
#[derive(Debug, Clone, Default)]
pub struct PreemptHandle {
    flag: Arc<AtomicBool>,
}

impl PreemptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preempt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_preempted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
