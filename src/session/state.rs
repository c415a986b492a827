use serde::{Deserialize, Serialize};

/// Lifecycle state of the recording session
///
/// Exactly one state is active; every transition happens under the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No request in flight; audio is ignored
    #[default]
    Idle,
    /// Waiting for speech to begin
    Armed,
    /// Accumulating the utterance
    Recording,
    /// Utterance finalized; buffer ready to drain
    Finished,
    /// Cancelled by the caller; buffer discarded
    Preempted,
    /// Request deadline passed; whatever was captured is kept
    TimedOut,
}

impl SessionState {
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Armed => "Listening for speech",
            SessionState::Recording => "Recording speech",
            SessionState::Finished => "Utterance complete",
            SessionState::Preempted => "Cancelled",
            SessionState::TimedOut => "Timed out",
        }
    }

    /// Whether incoming audio is consumed in this state
    pub fn accepts_audio(&self) -> bool {
        matches!(self, SessionState::Armed | SessionState::Recording)
    }

    /// Whether the current utterance has reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Preempted | SessionState::TimedOut
        )
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }
}

/// Why an utterance stopped growing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// VAD reported the end of speech
    SpeechEnded,
    /// Hard cap on utterance length reached
    MaxUtterance,
    /// Overall request deadline passed
    RequestTimeout,
}

/// Side effects published by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    RecordingBegan {
        /// Padded speech start, in samples since arm
        start_sample: u64,
        /// Samples seeded from the look-back window
        pre_roll_samples: usize,
    },
    RecordingEnded {
        duration_ms: u64,
        reason: FinishReason,
    },
}
