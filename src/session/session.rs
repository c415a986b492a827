use super::config::SessionConfig;
use super::state::{FinishReason, SessionEvent, SessionState};
use super::stats::{SessionSnapshot, Utterance};
use crate::audio::{AmplitudeGate, AmplitudeThreshold, AudioFormat, AudioFrame, FrameAccumulator, Window};
use crate::error::{CaptureError, CaptureResult};
use crate::vad::{SpeechClassifier, VadTransition, VoiceActivityGate};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Voice-activity-gated recording buffer
///
/// Created once per node and reset between requests. All mutable state sits
/// behind a single lock: the audio-delivery side takes it once per frame batch
/// and the controller takes it for state reads and lifecycle calls.
pub struct RecordingSession {
    config: SessionConfig,

    /// Runtime amplitude threshold (shared with the control surface)
    threshold: AmplitudeThreshold,

    inner: Mutex<SessionInner>,

    /// Side-effect channel (state changes, recording began/ended)
    events: broadcast::Sender<SessionEvent>,
}

struct SessionInner {
    state: SessionState,
    accumulator: FrameAccumulator,
    amplitude: AmplitudeGate,
    vad: VoiceActivityGate,

    /// Utterance samples; capacity is kept across resets
    buffer: Vec<f32>,
    /// Offset of `buffer[0]` in samples since arm
    buffer_start: u64,
    max_samples: usize,
    max_utterance: Duration,
    sample_rate: u32,

    /// Per-request overrides, applied at the next arm
    threshold_override: Option<f32>,

    armed_at: Option<Instant>,
    recording_started_at: Option<Instant>,
    finish_reason: Option<FinishReason>,
    frames_dropped: u64,

    events: broadcast::Sender<SessionEvent>,
}

impl RecordingSession {
    /// Create the session; fails with a configuration fault on a bad format.
    pub fn new(
        config: SessionConfig,
        classifier: Box<dyn SpeechClassifier>,
        threshold: AmplitudeThreshold,
    ) -> CaptureResult<Self> {
        config.validate()?;

        let window_samples = config.window_samples();
        let max_samples = config.max_utterance_samples();
        let vad = VoiceActivityGate::new(classifier, &config.vad)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        info!(
            "Recording session ready: {}Hz, {}ms windows ({} samples), max utterance {:?}, classifier {}",
            config.format.sample_rate,
            config.window_ms,
            window_samples,
            config.max_utterance,
            vad.classifier_name()
        );

        let inner = SessionInner {
            state: SessionState::Idle,
            accumulator: FrameAccumulator::new(window_samples),
            amplitude: AmplitudeGate::new(threshold.get()),
            vad,
            buffer: Vec::with_capacity(max_samples + window_samples),
            buffer_start: 0,
            max_samples,
            max_utterance: config.max_utterance,
            sample_rate: config.format.sample_rate,
            threshold_override: None,
            armed_at: None,
            recording_started_at: None,
            finish_reason: None,
            frames_dropped: 0,
            events: events.clone(),
        };

        Ok(Self {
            config,
            threshold,
            inner: Mutex::new(inner),
            events,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn format(&self) -> AudioFormat {
        self.config.format
    }

    pub fn amplitude_threshold(&self) -> &AmplitudeThreshold {
        &self.threshold
    }

    /// Subscribe to session side effects
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Apply per-request settings for the next arm.
    ///
    /// Only valid while idle. `amplitude_threshold` is a one-shot override of
    /// the runtime threshold; it is cleared by the next reset.
    pub fn configure(&self, sensitivity: f32, amplitude_threshold: Option<f32>) -> CaptureResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Idle {
            return Err(CaptureError::InvariantViolation(format!(
                "configure called while {:?}; reset first",
                inner.state
            )));
        }

        if let Some(value) = amplitude_threshold {
            if !(0.0..=1.0).contains(&value) {
                return Err(CaptureError::ThresholdOutOfRange {
                    value,
                    current: self.threshold.get(),
                });
            }
        }

        inner.vad.set_sensitivity(sensitivity)?;
        inner.threshold_override = amplitude_threshold;
        Ok(())
    }

    /// Idle (or a finished utterance) → Armed.
    ///
    /// Arming while already armed or recording is a programming error: the
    /// session is forced back to idle and the violation is returned.
    pub fn arm(&self) -> CaptureResult<()> {
        let mut inner = self.inner.lock();

        if matches!(inner.state, SessionState::Armed | SessionState::Recording) {
            let state = inner.state;
            warn!("arm() called while {:?}; forcing session to idle", state);
            inner.reset(self.config.vad.sensitivity);
            return Err(CaptureError::InvariantViolation(format!(
                "arm() called while {:?} without reset",
                state
            )));
        }

        let threshold = inner.threshold_override.unwrap_or_else(|| self.threshold.get());
        inner.clear_audio();
        inner.amplitude.reset(threshold);
        inner.vad.reset();
        inner.finish_reason = None;
        inner.recording_started_at = None;
        inner.armed_at = Some(Instant::now());
        inner.transition(SessionState::Armed);

        info!(
            "Session armed (amplitude threshold {:.3}, sensitivity {:.2})",
            threshold,
            inner.vad.sensitivity()
        );
        Ok(())
    }

    /// Any state → Idle, unconditionally.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.reset(self.config.vad.sensitivity);
        debug!("Session reset");
    }

    /// Feed one batch of intake audio.
    ///
    /// Frames are ignored unless the session is armed or recording.
    pub fn push_frame(&self, frame: &AudioFrame) -> CaptureResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts_audio() {
            return Ok(());
        }

        if !self.config.format.matches(frame) {
            inner.frames_dropped += 1;
            warn!(
                "Dropping frame in unexpected format: {}Hz/{}ch (expected {}Hz/{}ch)",
                frame.sample_rate,
                frame.channels,
                self.config.format.sample_rate,
                self.config.format.channels
            );
            return Ok(());
        }

        inner.accumulator.push(&frame.samples);
        while inner.state.accepts_audio() {
            let Some(window) = inner.accumulator.drain() else {
                break;
            };
            inner.process_window(window)?;
        }
        Ok(())
    }

    /// Enforce the wall-clock utterance cap; called once per poll.
    pub fn tick(&self, now: Instant) -> SessionState {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Recording {
            if let Some(started) = inner.recording_started_at {
                if now.saturating_duration_since(started) >= inner.max_utterance {
                    info!("Utterance reached {:?} cap", inner.max_utterance);
                    inner.finish(FinishReason::MaxUtterance);
                }
            }
        }
        inner.state
    }

    /// Overall request deadline passed: Armed/Recording → TimedOut.
    ///
    /// Captured audio is kept for `drain`. A finished utterance stays finished.
    pub fn time_out(&self) -> SessionState {
        let mut inner = self.inner.lock();
        if inner.state.accepts_audio() {
            let was_recording = inner.state.is_recording();
            inner.finish_reason = Some(FinishReason::RequestTimeout);
            if was_recording {
                inner.emit_recording_ended(FinishReason::RequestTimeout);
            }
            inner.transition(SessionState::TimedOut);
        }
        inner.state
    }

    /// External cancellation: discard the buffer and mark preempted.
    pub fn preempt(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Idle {
            return;
        }
        inner.clear_audio();
        inner.transition(SessionState::Preempted);
        info!("Session preempted; buffer discarded");
    }

    /// Hand out the finalized utterance, leaving the buffer empty.
    ///
    /// Returns `None` unless the session is Finished or TimedOut with audio.
    pub fn drain(&self) -> Option<Utterance> {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, SessionState::Finished | SessionState::TimedOut) {
            return None;
        }
        if inner.buffer.is_empty() {
            return None;
        }

        let samples: Vec<f32> = inner.buffer.drain(..).collect();
        Some(Utterance {
            samples,
            sample_rate: inner.sample_rate,
            start_sample: inner.buffer_start,
            reason: inner
                .finish_reason
                .unwrap_or(FinishReason::RequestTimeout),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let now = Instant::now();
        let since = |t: Option<Instant>| t.map(|t| now.saturating_duration_since(t).as_millis() as u64);

        SessionSnapshot {
            state: inner.state,
            level: inner.amplitude.last_level(),
            gate_open: inner.amplitude.is_open(),
            amplitude_threshold: inner.amplitude.threshold(),
            sensitivity: inner.vad.sensitivity(),
            buffered_samples: inner.buffer.len(),
            windows_classified: inner.vad.windows_classified(),
            frames_dropped: inner.frames_dropped,
            armed_ms: since(inner.armed_at),
            recording_ms: since(inner.recording_started_at),
            finish_reason: inner.finish_reason,
        }
    }
}

impl SessionInner {
    fn process_window(&mut self, window: Window) -> CaptureResult<()> {
        let level = self.amplitude.observe(&window.samples);
        let gate_open = self.amplitude.has_reached_minimum(level);

        match self.state {
            SessionState::Armed => {
                if !gate_open {
                    return Ok(());
                }
                if let VadTransition::Start { sample } = self.vad.classify(&window)? {
                    self.begin_recording(&window, sample);
                }
            }
            SessionState::Recording => {
                self.buffer.extend_from_slice(&window.samples);
                if let VadTransition::End { sample } = self.vad.classify(&window)? {
                    self.flush_to(sample);
                    self.finish(FinishReason::SpeechEnded);
                    return Ok(());
                }
            }
            _ => return Ok(()),
        }

        self.enforce_sample_cap();
        Ok(())
    }

    fn begin_recording(&mut self, window: &Window, start_sample: u64) {
        self.buffer.clear();
        match self.accumulator.pre_roll() {
            Some(pre_roll) => {
                self.buffer_start = pre_roll.offset;
                self.buffer.extend_from_slice(&pre_roll.samples);
            }
            None => self.buffer_start = window.offset,
        }
        let pre_roll_samples = self.buffer.len();
        self.buffer.extend_from_slice(&window.samples);

        self.recording_started_at = Some(Instant::now());
        self.transition(SessionState::Recording);
        let _ = self.events.send(SessionEvent::RecordingBegan {
            start_sample,
            pre_roll_samples,
        });

        info!(
            "Recording began at sample {} ({} pre-roll samples)",
            start_sample, pre_roll_samples
        );
    }

    /// Drop trailing audio past the padded end boundary
    fn flush_to(&mut self, end_sample: u64) {
        let keep = end_sample.saturating_sub(self.buffer_start) as usize;
        if keep < self.buffer.len() {
            debug!(
                "Flushing {} trailing samples past end boundary",
                self.buffer.len() - keep
            );
            self.buffer.truncate(keep);
        }
    }

    fn enforce_sample_cap(&mut self) {
        if self.state == SessionState::Recording && self.buffer.len() >= self.max_samples {
            self.buffer.truncate(self.max_samples);
            info!("Utterance reached {} sample cap", self.max_samples);
            self.finish(FinishReason::MaxUtterance);
        }
    }

    /// Recording → Finished
    fn finish(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
        self.emit_recording_ended(reason);
        self.transition(SessionState::Finished);
    }

    fn emit_recording_ended(&self, reason: FinishReason) {
        let duration_ms = self.buffer.len() as u64 * 1000 / u64::from(self.sample_rate);
        let _ = self.events.send(SessionEvent::RecordingEnded {
            duration_ms,
            reason,
        });
        info!("Recording ended: {:?} after {}ms of audio", reason, duration_ms);
    }

    fn clear_audio(&mut self) {
        self.buffer.clear();
        self.buffer_start = 0;
        self.accumulator.reset();
    }

    fn reset(&mut self, default_sensitivity: f32) {
        self.clear_audio();
        self.amplitude.reset(self.amplitude.threshold());
        self.vad.reset();
        // Per-request overrides are one-shot
        self.threshold_override = None;
        if self.vad.set_sensitivity(default_sensitivity).is_err() {
            warn!("Default sensitivity {} rejected", default_sensitivity);
        }
        self.armed_at = None;
        self.recording_started_at = None;
        self.finish_reason = None;
        self.transition(SessionState::Idle);
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
        debug!("Session state: {:?} -> {:?}", from, to);
    }
}
