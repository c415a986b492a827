//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that owns:
//! - The utterance buffer and its pre-roll seed
//! - The sticky amplitude gate and the VAD boundary gate
//! - Session state (idle/armed/recording/finished/preempted/timed out)
//! - The hard utterance-length cap

mod config;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use session::RecordingSession;
pub use state::{FinishReason, SessionEvent, SessionState};
pub use stats::{SessionSnapshot, Utterance};
