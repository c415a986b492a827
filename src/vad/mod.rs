//! Voice activity detection: the classifier seam and the boundary gate.

mod classifier;
mod gate;

pub use classifier::{DetectorLoader, EnergyClassifier, EnergyDetectorLoader, SpeechClassifier};
pub use gate::{VadGateConfig, VadTransition, VoiceActivityGate};
