use anyhow::{Context, Result};
use async_nats::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::messages::{AmplitudeMessage, CaptureResultMessage, RecordingStateMessage};
use crate::controller::{CaptureFeedback, CaptureOutcome};
use crate::session::SessionState;

/// NATS subjects used by the capture service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsSubjects {
    /// Audio frames from the capture source
    pub audio: String,
    pub amplitude: String,
    pub recording: String,
    /// Prefix; the capture ID is appended
    pub feedback: String,
    /// Prefix; the capture ID is appended
    pub result: String,
    pub transcribe: String,
    pub understand: String,
}

impl Default for NatsSubjects {
    fn default() -> Self {
        Self {
            audio: "audio.frame.mic".to_string(),
            amplitude: "capture.amplitude".to_string(),
            recording: "capture.recording".to_string(),
            feedback: "capture.feedback".to_string(),
            result: "capture.result".to_string(),
            transcribe: "stt.transcribe".to_string(),
            understand: "nlu.understand".to_string(),
        }
    }
}

pub struct NatsClient {
    client: Client,
    subjects: NatsSubjects,
    request_timeout: Duration,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(
        url: &str,
        subjects: NatsSubjects,
        request_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subjects,
            request_timeout,
        })
    }

    pub fn subjects(&self) -> &NatsSubjects {
        &self.subjects
    }

    /// Subscribe to the audio frame stream
    pub async fn subscribe_audio(&self) -> Result<async_nats::Subscriber> {
        let subject = self.subjects.audio.clone();

        info!("Subscribing to audio frames on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to audio frames")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }

    pub async fn publish_json<T: Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published to {}", subject);
        Ok(())
    }

    /// Request/reply with a JSON body, bounded by the request timeout
    pub async fn request_json<Req, Resp>(&self, subject: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;

        let reply = tokio::time::timeout(
            self.request_timeout,
            self.client.request(subject.to_string(), payload.into()),
        )
        .await
        .with_context(|| format!("Request to {} timed out after {:?}", subject, self.request_timeout))?
        .with_context(|| format!("Request to {} failed", subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Invalid reply from {}", subject))
    }

    pub async fn publish_amplitude(&self, feedback: &CaptureFeedback) -> Result<()> {
        let message = AmplitudeMessage {
            capture_id: Some(feedback.capture_id.clone()),
            peak: feedback.level,
            db: feedback.level_db,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.publish_json(self.subjects.amplitude.clone(), &message)
            .await
    }

    pub async fn publish_recording_state(&self, state: SessionState) -> Result<()> {
        let message = RecordingStateMessage {
            recording: state.is_recording(),
            state,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.publish_json(self.subjects.recording.clone(), &message)
            .await
    }

    pub async fn publish_feedback(&self, feedback: &CaptureFeedback) -> Result<()> {
        let subject = format!("{}.{}", self.subjects.feedback, feedback.capture_id);
        self.publish_json(subject, feedback).await
    }

    pub async fn publish_result(&self, capture_id: &str, outcome: &CaptureOutcome) -> Result<()> {
        let subject = format!("{}.{}", self.subjects.result, capture_id);
        let message = CaptureResultMessage {
            capture_id: capture_id.to_string(),
            outcome: outcome.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        info!("Publishing result for {} to {}", capture_id, subject);
        self.publish_json(subject, &message).await
    }
}
