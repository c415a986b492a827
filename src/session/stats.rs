use super::state::{FinishReason, SessionState};
use crate::audio::AmplitudeLevel;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,

    /// Level of the most recent window
    pub level: AmplitudeLevel,

    /// Whether the sticky amplitude gate has opened since arm
    pub gate_open: bool,

    /// Amplitude threshold in effect for the current arm
    pub amplitude_threshold: f32,

    /// VAD sensitivity in effect for the current arm
    pub sensitivity: f32,

    /// Samples currently held in the utterance buffer
    pub buffered_samples: usize,

    /// Windows handed to the classifier since arm
    pub windows_classified: u64,

    /// Frames rejected for not matching the intake format
    pub frames_dropped: u64,

    /// Milliseconds since arm, if armed
    pub armed_ms: Option<u64>,

    /// Milliseconds since speech started, if recording began
    pub recording_ms: Option<u64>,

    pub finish_reason: Option<FinishReason>,
}

/// A finalized utterance handed out by `RecordingSession::drain`
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Offset of the first sample, counted from arm
    pub start_sample: u64,
    pub reason: FinishReason,
}

impl Utterance {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / u64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
