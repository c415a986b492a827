use crate::session::Utterance;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One text segment returned by speech-to-text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,

    /// Probability (0.0 to 1.0) that the segment is not speech at all
    #[serde(default)]
    pub no_speech_prob: f32,
}

/// Structured result of natural-language understanding for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Understanding {
    /// Text that was understood
    pub text: String,

    /// Opaque structured payload from the NLU service
    pub result: serde_json::Value,
}

/// Speech-to-text collaborator
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, utterance: &Utterance) -> Result<Vec<TranscriptSegment>>;
}

/// Natural-language-understanding collaborator
#[async_trait::async_trait]
pub trait Understander: Send + Sync {
    async fn understand(&self, text: &str) -> Result<Understanding>;
}
