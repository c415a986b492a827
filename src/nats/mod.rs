pub mod client;
pub mod downstream;
pub mod intake;
pub mod messages;
pub mod telemetry;

pub use client::{NatsClient, NatsSubjects};
pub use downstream::{NatsTranscriber, NatsUnderstander};
pub use intake::run_audio_intake;
pub use messages::{AudioFrameMessage, CaptureResultMessage, RecordingStateMessage};
pub use telemetry::run_telemetry;
