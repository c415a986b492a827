use crate::audio::{AudioFormat, PcmFormat};
use crate::controller::ControllerConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::nats::NatsSubjects;
use crate::session::SessionConfig;
use crate::vad::VadGateConfig;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub recordings: RecordingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Where intake audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioSourceKind {
    #[default]
    Nats,
    Wav,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default)]
    pub pcm: PcmFormat,
    #[serde(default)]
    pub source: AudioSourceKind,
    /// WAV file replayed when `source = "wav"`
    pub wav_path: Option<PathBuf>,
    /// Replay the WAV file forever
    #[serde(default)]
    pub wav_loop: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub window_ms: u64,
    pub hangover_ms: u64,
    pub speech_pad_ms: u64,
    /// Used when a request does not set its own
    pub sensitivity: f32,
    /// Level at which the energy detector scores 0.5
    pub energy_midpoint_db: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            window_ms: 30,
            hangover_ms: 300,
            speech_pad_ms: 100,
            sensitivity: 0.5,
            energy_midpoint_db: -40.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub max_utterance_ms: u64,
    pub poll_interval_ms: u64,
    pub amplitude_threshold: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_utterance_ms: 10_000,
            poll_interval_ms: 30,
            amplitude_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub no_speech_threshold: f32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            no_speech_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    pub subjects: NatsSubjects,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_timeout_ms: 10_000,
            subjects: NatsSubjects::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingsConfig {
    /// Finalized utterances are written here as WAV when set
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file, with `LOQA_CAPTURE__SECTION__KEY` overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("LOQA_CAPTURE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Startup checks; any failure here is fatal
    pub fn validate(&self) -> CaptureResult<()> {
        self.audio_format().validate()?;

        if !(10..=100).contains(&self.vad.window_ms) {
            return Err(CaptureError::Configuration(format!(
                "vad.window_ms = {} outside 10..=100",
                self.vad.window_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.session.amplitude_threshold) {
            return Err(CaptureError::Configuration(format!(
                "session.amplitude_threshold = {} outside [0, 1]",
                self.session.amplitude_threshold
            )));
        }
        if !(self.vad.sensitivity > 0.0 && self.vad.sensitivity <= 1.0) {
            return Err(CaptureError::Configuration(format!(
                "vad.sensitivity = {} outside (0, 1]",
                self.vad.sensitivity
            )));
        }
        if self.audio.source == AudioSourceKind::Wav && self.audio.wav_path.is_none() {
            return Err(CaptureError::Configuration(
                "audio.source = \"wav\" requires audio.wav_path".to_string(),
            ));
        }
        self.to_session_config().validate()
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            pcm: self.audio.pcm,
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            format: self.audio_format(),
            window_ms: self.vad.window_ms,
            max_utterance: Duration::from_millis(self.session.max_utterance_ms),
            vad: VadGateConfig {
                sample_rate: self.audio.sample_rate,
                sensitivity: self.vad.sensitivity,
                hangover_ms: self.vad.hangover_ms,
                speech_pad_ms: self.vad.speech_pad_ms,
            },
        }
    }

    pub fn to_controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_millis(self.session.poll_interval_ms),
            no_speech_threshold: self.transcription.no_speech_threshold,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.nats.request_timeout_ms)
    }
}
