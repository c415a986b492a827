use crate::audio::AudioFormat;
use crate::error::{CaptureError, CaptureResult};
use crate::vad::VadGateConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Intake audio format (validated at construction)
    pub format: AudioFormat,

    /// Duration of one VAD analysis window
    /// Default: 30ms (480 samples at 16kHz)
    pub window_ms: u64,

    /// Hard cap on a single utterance
    /// Default: 10 seconds
    pub max_utterance: Duration,

    /// Boundary detector settings (default sensitivity, hangover, padding)
    pub vad: VadGateConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            window_ms: 30,
            max_utterance: Duration::from_secs(10),
            vad: VadGateConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> CaptureResult<()> {
        self.format.validate()?;

        if !(10..=100).contains(&self.window_ms) {
            return Err(CaptureError::Configuration(format!(
                "VAD window of {}ms outside 10..=100ms",
                self.window_ms
            )));
        }
        if self.max_utterance < Duration::from_millis(self.window_ms) {
            return Err(CaptureError::Configuration(format!(
                "max utterance {:?} shorter than one window",
                self.max_utterance
            )));
        }
        if self.vad.sample_rate != self.format.sample_rate {
            return Err(CaptureError::Configuration(format!(
                "VAD sample rate {}Hz does not match intake {}Hz",
                self.vad.sample_rate, self.format.sample_rate
            )));
        }
        Ok(())
    }

    pub fn window_samples(&self) -> usize {
        self.format.samples_for_ms(self.window_ms)
    }

    pub fn max_utterance_samples(&self) -> usize {
        self.format
            .samples_for_ms(self.max_utterance.as_millis() as u64)
    }
}
