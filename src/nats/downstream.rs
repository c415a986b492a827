use anyhow::Result;
use base64::Engine;
use std::sync::Arc;
use tracing::debug;

use super::client::NatsClient;
use super::messages::{TranscribeRequest, TranscribeResponse, UnderstandRequest, UnderstandResponse};
use crate::audio::encode_s16le;
use crate::controller::{TranscriptSegment, Transcriber, Understander, Understanding};
use crate::session::Utterance;

/// Speech-to-text over NATS request/reply
pub struct NatsTranscriber {
    client: Arc<NatsClient>,
}

impl NatsTranscriber {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transcriber for NatsTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> Result<Vec<TranscriptSegment>> {
        let request = TranscribeRequest {
            pcm: base64::engine::general_purpose::STANDARD.encode(encode_s16le(&utterance.samples)),
            sample_rate: utterance.sample_rate,
            channels: 1,
        };

        debug!(
            "Requesting transcription of {}ms of audio",
            utterance.duration_ms()
        );

        let subject = self.client.subjects().transcribe.clone();
        let response: TranscribeResponse = self.client.request_json(&subject, &request).await?;

        if let Some(error) = response.error {
            anyhow::bail!("STT service error: {}", error);
        }
        Ok(response.segments)
    }
}

/// Natural-language understanding over NATS request/reply
pub struct NatsUnderstander {
    client: Arc<NatsClient>,
}

impl NatsUnderstander {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Understander for NatsUnderstander {
    async fn understand(&self, text: &str) -> Result<Understanding> {
        let request = UnderstandRequest {
            text: text.to_string(),
        };

        let subject = self.client.subjects().understand.clone();
        let response: UnderstandResponse = self.client.request_json(&subject, &request).await?;

        if let Some(error) = response.error {
            anyhow::bail!("NLU service error: {}", error);
        }
        Ok(Understanding {
            text: text.to_string(),
            result: response.result,
        })
    }
}
