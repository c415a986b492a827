use super::classifier::SpeechClassifier;
use crate::audio::Window;
use crate::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

/// Margin below the sensitivity a window must fall to count as silence
/// once speech has started
const NEGATIVE_MARGIN: f32 = 0.15;
const MIN_NEGATIVE_THRESHOLD: f32 = 0.01;

/// Configuration for the speech boundary detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadGateConfig {
    pub sample_rate: u32,
    /// Speech probability at or above which a window counts as speech
    pub sensitivity: f32,
    /// Continuous silence required before speech is declared over
    pub hangover_ms: u64,
    /// Padding attached before a start and after an end boundary
    pub speech_pad_ms: u64,
}

impl Default for VadGateConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            sensitivity: 0.5,
            hangover_ms: 300,
            speech_pad_ms: 100,
        }
    }
}

/// Speech boundary emitted by [`VoiceActivityGate::classify`]
///
/// Sample positions are offsets since the last reset, with padding applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    None,
    Start { sample: u64 },
    End { sample: u64 },
}

/// Turns per-window speech probabilities into start/end events.
///
/// An end is only emitted after `hangover_ms` of continuous silence, so short
/// pauses inside an utterance do not split it.
pub struct VoiceActivityGate {
    classifier: Box<dyn SpeechClassifier>,
    sensitivity: f32,
    hangover_samples: u64,
    pad_samples: u64,
    triggered: bool,
    silence_start: Option<u64>,
    windows_classified: u64,
}

impl VoiceActivityGate {
    pub fn new(classifier: Box<dyn SpeechClassifier>, config: &VadGateConfig) -> CaptureResult<Self> {
        check_sensitivity(config.sensitivity)?;
        let per_ms = |ms: u64| u64::from(config.sample_rate) * ms / 1000;

        Ok(Self {
            classifier,
            sensitivity: config.sensitivity,
            hangover_samples: per_ms(config.hangover_ms),
            pad_samples: per_ms(config.speech_pad_ms),
            triggered: false,
            silence_start: None,
            windows_classified: 0,
        })
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) -> CaptureResult<()> {
        check_sensitivity(sensitivity)?;
        self.sensitivity = sensitivity;
        Ok(())
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Whether speech is currently considered ongoing
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Windows passed to the classifier since the last reset
    pub fn windows_classified(&self) -> u64 {
        self.windows_classified
    }

    /// Must be called before every new utterance; stale state produces
    /// false boundaries.
    pub fn reset(&mut self) {
        self.classifier.reset();
        self.triggered = false;
        self.silence_start = None;
        self.windows_classified = 0;
    }

    pub fn classify(&mut self, window: &Window) -> CaptureResult<VadTransition> {
        let probability = self
            .classifier
            .speech_probability(&window.samples)
            .map_err(|e| CaptureError::Classifier(format!("{:#}", e)))?;
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.windows_classified += 1;

        if probability >= self.sensitivity {
            self.silence_start = None;
            if !self.triggered {
                self.triggered = true;
                return Ok(VadTransition::Start {
                    sample: window.offset.saturating_sub(self.pad_samples),
                });
            }
            return Ok(VadTransition::None);
        }

        if self.triggered && probability < self.negative_threshold() {
            let silence_start = *self.silence_start.get_or_insert(window.offset);
            if window.end().saturating_sub(silence_start) >= self.hangover_samples {
                self.triggered = false;
                self.silence_start = None;
                return Ok(VadTransition::End {
                    sample: silence_start + self.pad_samples,
                });
            }
        }

        Ok(VadTransition::None)
    }

    fn negative_threshold(&self) -> f32 {
        (self.sensitivity - NEGATIVE_MARGIN).max(MIN_NEGATIVE_THRESHOLD)
    }
}

fn check_sensitivity(sensitivity: f32) -> CaptureResult<()> {
    if sensitivity > 0.0 && sensitivity <= 1.0 {
        Ok(())
    } else {
        Err(CaptureError::SensitivityOutOfRange(sensitivity))
    }
}
