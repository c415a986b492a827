//! Capture request lifecycle
//!
//! `SessionController` arms the recording session, polls it until speech
//! ends, the request deadline passes, or the caller preempts, then hands the
//! finalized utterance to the transcription and understanding collaborators.

mod collaborators;
mod controller;
mod request;

pub use collaborators::{TranscriptSegment, Transcriber, Understander, Understanding};
pub use controller::{ControllerConfig, SessionController};
pub use request::{CaptureFeedback, CaptureOutcome, CaptureRequest, PreemptHandle};
