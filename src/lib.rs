pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod nats;
pub mod session;
pub mod vad;

pub use audio::{
    AmplitudeGate, AmplitudeThreshold, AudioFile, AudioFormat, AudioFrame, FileSource,
    FrameAccumulator, PcmFormat, UtteranceArchive, Window,
};
pub use config::Config;
pub use controller::{
    CaptureFeedback, CaptureOutcome, CaptureRequest, ControllerConfig, PreemptHandle,
    SessionController, Transcriber, TranscriptSegment, Understander, Understanding,
};
pub use error::{CaptureError, CaptureResult};
pub use http::{create_router, AppState};
pub use nats::{AudioFrameMessage, NatsClient, NatsTranscriber, NatsUnderstander};
pub use session::{
    FinishReason, RecordingSession, SessionConfig, SessionEvent, SessionSnapshot, SessionState,
    Utterance,
};
pub use vad::{
    DetectorLoader, EnergyClassifier, EnergyDetectorLoader, SpeechClassifier, VadGateConfig,
    VoiceActivityGate,
};
