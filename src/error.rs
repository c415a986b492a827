use thiserror::Error;

/// Errors raised by the capture core.
///
/// Timeouts and preemptions are not errors; they are reported through
/// [`crate::controller::CaptureOutcome`]. Segments dropped for low confidence
/// never surface at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaptureError {
    /// Bad audio format or settings detected at startup. Fatal.
    #[error("configuration fault: {0}")]
    Configuration(String),

    /// A lifecycle call made in a state that forbids it (e.g. arming twice).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Amplitude threshold outside [0.0, 1.0]; `current` is the value still in effect.
    #[error("amplitude threshold {value} out of range [0.0, 1.0] (keeping {current})")]
    ThresholdOutOfRange { value: f32, current: f32 },

    /// Speech sensitivity outside (0.0, 1.0].
    #[error("sensitivity {0} out of range (0.0, 1.0]")]
    SensitivityOutOfRange(f32),

    #[error("speech classifier failed: {0}")]
    Classifier(String),

    /// Transcription or understanding call failed. Not retried.
    #[error("downstream call failed: {0}")]
    Downstream(String),
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
