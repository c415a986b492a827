use super::collaborators::{Transcriber, Understander, Understanding};
use super::request::{CaptureFeedback, CaptureOutcome, CaptureRequest, PreemptHandle};
use crate::audio::ArchiveRequest;
use crate::error::{CaptureError, CaptureResult};
use crate::session::{RecordingSession, SessionState, Utterance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Controller tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// How often the session is polled while a request is running
    pub poll_interval: Duration,

    /// Segments at or above this no-speech probability are dropped
    pub no_speech_threshold: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(30),
            no_speech_threshold: 0.6,
        }
    }
}

/// Drives one capture request end to end: arm, poll, finalize, and hand the
/// utterance to transcription and understanding.
pub struct SessionController {
    session: Arc<RecordingSession>,
    transcriber: Arc<dyn Transcriber>,
    understander: Arc<dyn Understander>,
    config: ControllerConfig,

    /// Progress sink, if anyone is listening
    feedback_tx: Option<mpsc::Sender<CaptureFeedback>>,

    /// Finalized utterances queued for the WAV archive
    archive_tx: Option<mpsc::Sender<ArchiveRequest>>,

    /// Serializes requests; a new request waits for a preempted one to unwind
    run_lock: Mutex<()>,
}

impl SessionController {
    pub fn new(
        session: Arc<RecordingSession>,
        transcriber: Arc<dyn Transcriber>,
        understander: Arc<dyn Understander>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            session,
            transcriber,
            understander,
            config,
            feedback_tx: None,
            archive_tx: None,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_feedback(mut self, tx: mpsc::Sender<CaptureFeedback>) -> Self {
        self.feedback_tx = Some(tx);
        self
    }

    pub fn with_archive(mut self, tx: mpsc::Sender<ArchiveRequest>) -> Self {
        self.archive_tx = Some(tx);
        self
    }

    pub fn session(&self) -> &Arc<RecordingSession> {
        &self.session
    }

    /// Run one capture request to a terminal outcome.
    ///
    /// Preemption and timeout are outcomes; errors are configuration
    /// problems, lifecycle violations, or downstream failures.
    pub async fn run_once(
        &self,
        capture_id: &str,
        request: &CaptureRequest,
        preempt: &PreemptHandle,
    ) -> CaptureResult<CaptureOutcome> {
        let _running = self.run_lock.lock().await;

        info!(
            "Capture {} starting (sensitivity {:.2}, max {:?})",
            capture_id, request.sensitivity, request.max_duration
        );

        self.session.reset();
        self.session
            .configure(request.sensitivity, request.amplitude_threshold)?;
        self.session.arm()?;

        let armed_at = Instant::now();
        let Some(deadline) = armed_at.checked_add(request.max_duration) else {
            self.session.reset();
            return Err(CaptureError::InvariantViolation(format!(
                "capture deadline {:?} overflows the clock",
                request.max_duration
            )));
        };

        let final_state = loop {
            if preempt.is_preempted() {
                return Ok(self.preempted(capture_id));
            }

            let now = Instant::now();
            let state = self.session.tick(now);
            self.publish_feedback(capture_id, armed_at);

            match state {
                SessionState::Finished => break state,
                SessionState::Armed | SessionState::Recording => {
                    if now >= deadline {
                        info!("Capture {} hit its {:?} deadline", capture_id, request.max_duration);
                        break self.session.time_out();
                    }
                }
                other => {
                    // Someone else reset or cancelled the session under us
                    warn!("Capture {} lost its session (state {:?})", capture_id, other);
                    return Ok(self.preempted(capture_id));
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        };

        let utterance = self.session.drain();
        let utterance_ms = utterance.as_ref().map(Utterance::duration_ms).unwrap_or(0);

        let results = match utterance {
            Some(utterance) => {
                self.archive(capture_id, &utterance);
                self.process(capture_id, &utterance).await?
            }
            None => {
                info!("Capture {} finished without audio", capture_id);
                Vec::new()
            }
        };

        info!(
            "Capture {} done: {:?}, {}ms of audio, {} results",
            capture_id,
            final_state,
            utterance_ms,
            results.len()
        );

        Ok(match final_state {
            SessionState::TimedOut => CaptureOutcome::TimedOut {
                results,
                utterance_ms,
            },
            _ => CaptureOutcome::Completed {
                results,
                utterance_ms,
            },
        })
    }

    fn preempted(&self, capture_id: &str) -> CaptureOutcome {
        info!("Capture {} preempted", capture_id);
        self.session.preempt();
        self.session.reset();
        CaptureOutcome::Preempted
    }

    /// Transcribe once, then understand every segment that looks like speech.
    /// No retries: one attempt per finalized utterance.
    async fn process(
        &self,
        capture_id: &str,
        utterance: &Utterance,
    ) -> CaptureResult<Vec<Understanding>> {
        let segments = self
            .transcriber
            .transcribe(utterance)
            .await
            .map_err(|e| {
                error!("Transcription failed for {}: {:#}", capture_id, e);
                CaptureError::Downstream(format!("transcription: {:#}", e))
            })?;

        if segments.len() > 1 {
            warn!(
                "Capture {}: expected one speech segment, got {}",
                capture_id,
                segments.len()
            );
        }

        let mut results = Vec::with_capacity(segments.len());
        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            if segment.no_speech_prob >= self.config.no_speech_threshold {
                debug!(
                    "Dropping segment {:?} (no-speech probability {:.2})",
                    text, segment.no_speech_prob
                );
                continue;
            }

            let understanding = self.understander.understand(text).await.map_err(|e| {
                error!("Understanding failed for {}: {:#}", capture_id, e);
                CaptureError::Downstream(format!("understanding: {:#}", e))
            })?;
            results.push(understanding);
        }

        Ok(results)
    }

    fn publish_feedback(&self, capture_id: &str, armed_at: Instant) {
        let Some(tx) = &self.feedback_tx else {
            return;
        };

        let snapshot = self.session.snapshot();
        let feedback = CaptureFeedback {
            capture_id: capture_id.to_string(),
            state: snapshot.state,
            level: snapshot.level.peak,
            level_db: snapshot.level.db,
            elapsed_ms: armed_at.elapsed().as_millis() as u64,
            partial_text: None,
        };

        // Feedback is best effort; never stall the poll loop on it
        if tx.try_send(feedback).is_err() {
            debug!("Feedback channel full or closed; dropping update");
        }
    }

    fn archive(&self, capture_id: &str, utterance: &Utterance) {
        if let Some(tx) = &self.archive_tx {
            let request = ArchiveRequest {
                capture_id: capture_id.to_string(),
                utterance: utterance.clone(),
            };
            if tx.try_send(request).is_err() {
                warn!("Archive queue full; utterance {} not saved", capture_id);
            }
        }
    }
}
