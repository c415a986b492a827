use crate::audio::{AudioFrame, PcmFormat};
use crate::controller::{CaptureOutcome, TranscriptSegment};
use crate::session::SessionState;
use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Audio frame message received from the capture source
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub source: String,
    pub sequence: u32,
    pub pcm: String,  // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default)]
    pub format: PcmFormat,
    pub timestamp: String,  // RFC3339 timestamp
    #[serde(rename = "final", default)]
    pub final_frame: bool,
}

impl AudioFrameMessage {
    /// Decode the base64 payload into a normalized frame
    pub fn to_frame(&self, timestamp_ms: u64) -> Result<AudioFrame> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.pcm)
            .context("Invalid base64 PCM payload")?;
        AudioFrame::decode(
            &bytes,
            self.format,
            self.sample_rate,
            self.channels,
            timestamp_ms,
        )
    }
}

/// Periodic amplitude telemetry
#[derive(Debug, Serialize, Deserialize)]
pub struct AmplitudeMessage {
    pub capture_id: Option<String>,
    pub peak: f32,
    pub db: f32,
    pub timestamp: String,
}

/// Published on every session state transition
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordingStateMessage {
    pub recording: bool,
    pub state: SessionState,
    pub timestamp: String,
}

/// Request sent to the speech-to-text service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub pcm: String,  // Base64-encoded s16le PCM
    pub sample_rate: u32,
    pub channels: u16,
}

/// Reply from the speech-to-text service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request sent to the understanding service
#[derive(Debug, Serialize, Deserialize)]
pub struct UnderstandRequest {
    pub text: String,
}

/// Reply from the understanding service
#[derive(Debug, Serialize, Deserialize)]
pub struct UnderstandResponse {
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal result of a capture request
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureResultMessage {
    pub capture_id: String,
    pub outcome: CaptureOutcome,
    pub timestamp: String,
}
