use anyhow::Result;

/// Frame-level speech/non-speech oracle
///
/// # Window Contract
/// Implementations receive exactly one analysis window per call, at the
/// intake sample rate. Window size in samples = sample_rate * window_ms / 1000
/// (30ms @ 16kHz = 480 samples).
pub trait SpeechClassifier: Send {
    /// Probability in [0.0, 1.0] that the window contains speech
    fn speech_probability(&mut self, window: &[f32]) -> Result<f32>;

    /// Drop any recurrent state carried between windows
    fn reset(&mut self);

    fn name(&self) -> &'static str {
        "unknown_classifier"
    }
}

/// Produces speech classifiers
///
/// Model download, caching and fallback all live behind this trait.
pub trait DetectorLoader: Send + Sync {
    fn load_detector(&self) -> Result<Box<dyn SpeechClassifier>>;
}

/// Lightweight detector that maps RMS energy to a speech probability.
///
/// Used when no neural model is deployed. The probability follows a logistic
/// curve centred on `midpoint_db`, so a window at the midpoint scores 0.5.
#[derive(Debug, Clone)]
pub struct EnergyClassifier {
    midpoint_db: f32,
    slope: f32,
}

impl EnergyClassifier {
    pub fn new(midpoint_db: f32) -> Self {
        Self {
            midpoint_db,
            slope: 0.5,
        }
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new(-40.0)
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn speech_probability(&mut self, window: &[f32]) -> Result<f32> {
        if window.is_empty() {
            return Ok(0.0);
        }
        let energy: f32 = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
        let rms = energy.sqrt().max(1e-6);
        let db = 20.0 * rms.log10();
        Ok(1.0 / (1.0 + (-(db - self.midpoint_db) * self.slope).exp()))
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "energy_classifier"
    }
}

/// Loader for [`EnergyClassifier`]
#[derive(Debug, Clone)]
pub struct EnergyDetectorLoader {
    pub midpoint_db: f32,
}

impl DetectorLoader for EnergyDetectorLoader {
    fn load_detector(&self) -> Result<Box<dyn SpeechClassifier>> {
        Ok(Box::new(EnergyClassifier::new(self.midpoint_db)))
    }
}
