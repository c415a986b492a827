// Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::Result;
use loqa_capture::audio::{AmplitudeThreshold, AudioFrame};
use loqa_capture::controller::{TranscriptSegment, Transcriber, Understander, Understanding};
use loqa_capture::session::{RecordingSession, SessionConfig, SessionState, Utterance};
use loqa_capture::vad::EnergyClassifier;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 16000;

/// 16kHz mono session with the energy classifier
pub fn session(threshold: f32, max_utterance: Duration) -> Arc<RecordingSession> {
    let config = SessionConfig {
        max_utterance,
        ..SessionConfig::default()
    };
    Arc::new(
        RecordingSession::new(
            config,
            Box::new(EnergyClassifier::default()),
            AmplitudeThreshold::new(threshold).unwrap(),
        )
        .unwrap(),
    )
}

fn samples_for(ms: u64) -> usize {
    (ms * u64::from(SAMPLE_RATE) / 1000) as usize
}

pub fn silence(ms: u64) -> Vec<f32> {
    vec![0.0; samples_for(ms)]
}

/// 440Hz sine with the given peak amplitude
pub fn tone(ms: u64, amplitude: f32) -> Vec<f32> {
    let count = samples_for(ms);
    (0..count)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin()
        })
        .collect()
}

/// Split samples into 20ms intake frames
pub fn frames(samples: &[f32]) -> Vec<AudioFrame> {
    samples
        .chunks(320)
        .enumerate()
        .map(|(i, chunk)| AudioFrame::new(chunk.to_vec(), SAMPLE_RATE, i as u64 * 20))
        .collect()
}

/// Wait until the session is armed, then deliver every frame
pub async fn feed_when_armed(session: Arc<RecordingSession>, samples: Vec<f32>) {
    while session.state() != SessionState::Armed {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    for frame in frames(&samples) {
        session.push_frame(&frame).unwrap();
    }
}

/// Returns scripted segments and remembers every utterance it saw
#[derive(Default)]
pub struct FakeTranscriber {
    pub segments: Mutex<Vec<TranscriptSegment>>,
    pub calls: Mutex<Vec<Utterance>>,
    pub fail: bool,
}

impl FakeTranscriber {
    pub fn with_segments(segments: &[(&str, f32)]) -> Arc<Self> {
        Arc::new(Self {
            segments: Mutex::new(
                segments
                    .iter()
                    .map(|(text, no_speech_prob)| TranscriptSegment {
                        text: text.to_string(),
                        no_speech_prob: *no_speech_prob,
                    })
                    .collect(),
            ),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, utterance: &Utterance) -> Result<Vec<TranscriptSegment>> {
        self.calls.lock().push(utterance.clone());
        if self.fail {
            anyhow::bail!("stt unavailable");
        }
        Ok(self.segments.lock().clone())
    }
}

/// Echoes the text back as an intent payload
#[derive(Default)]
pub struct FakeUnderstander {
    pub calls: Mutex<Vec<String>>,
}

impl FakeUnderstander {
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Understander for FakeUnderstander {
    async fn understand(&self, text: &str) -> Result<Understanding> {
        self.calls.lock().push(text.to_string());
        Ok(Understanding {
            text: text.to_string(),
            result: serde_json::json!({ "intent": "echo", "text": text }),
        })
    }
}
