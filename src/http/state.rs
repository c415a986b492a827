use crate::controller::{CaptureOutcome, PreemptHandle, SessionController};
use crate::nats::NatsClient;
use crate::session::RecordingSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Lifecycle of a capture as seen by HTTP clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Running,
    Completed,
    TimedOut,
    Preempted,
    Failed,
}

impl CaptureStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaptureStatus::Running)
    }
}

impl From<&CaptureOutcome> for CaptureStatus {
    fn from(outcome: &CaptureOutcome) -> Self {
        match outcome {
            CaptureOutcome::Completed { .. } => CaptureStatus::Completed,
            CaptureOutcome::TimedOut { .. } => CaptureStatus::TimedOut,
            CaptureOutcome::Preempted => CaptureStatus::Preempted,
        }
    }
}

/// Book-keeping for one capture request
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub status: CaptureStatus,
    pub outcome: Option<CaptureOutcome>,
    pub error: Option<String>,
    pub preempt: PreemptHandle,
}

impl CaptureRecord {
    pub fn running(preempt: PreemptHandle) -> Self {
        Self {
            status: CaptureStatus::Running,
            outcome: None,
            error: None,
            preempt,
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,

    /// Capture history (capture_id → record)
    pub captures: Arc<RwLock<HashMap<String, CaptureRecord>>>,

    /// The capture currently holding the session, if any
    pub active: Arc<Mutex<Option<(String, PreemptHandle)>>>,

    /// Results are also published here when connected
    pub nats: Option<Arc<NatsClient>>,

    /// Used when a request omits `max_duration_secs`
    pub default_max_duration: Duration,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            captures: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(Mutex::new(None)),
            nats: None,
            default_max_duration: Duration::from_secs(8),
        }
    }

    pub fn with_nats(mut self, client: Arc<NatsClient>) -> Self {
        self.nats = Some(client);
        self
    }

    pub fn session(&self) -> &Arc<RecordingSession> {
        self.controller.session()
    }
}
