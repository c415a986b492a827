use crate::error::{CaptureError, CaptureResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Sample rates the speech classifier accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [8000, 16000];

/// PCM encoding of incoming audio bytes (little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PcmFormat {
    /// Signed 16-bit integer samples
    #[default]
    S16,
    /// 32-bit float samples in [-1.0, 1.0]
    F32,
}

impl PcmFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmFormat::S16 => 2,
            PcmFormat::F32 => 4,
        }
    }
}

/// Fixed audio format of the intake stream
///
/// Validated once at startup and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (must be 1)
    pub channels: u16,
    /// Sample encoding
    #[serde(default)]
    pub pcm: PcmFormat,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // VAD and STT both expect 16kHz
            channels: 1,        // Mono
            pcm: PcmFormat::S16,
        }
    }
}

impl AudioFormat {
    /// Startup check for the intake format
    pub fn validate(&self) -> CaptureResult<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(CaptureError::Configuration(format!(
                "unsupported sample rate {}Hz (expected one of {:?})",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        if self.channels != 1 {
            return Err(CaptureError::Configuration(format!(
                "expected mono audio, got {} channels",
                self.channels
            )));
        }
        Ok(())
    }

    /// Whether a decoded frame was produced in this format
    pub fn matches(&self, frame: &AudioFrame) -> bool {
        frame.sample_rate == self.sample_rate && frame.channels == self.channels
    }

    /// Number of samples covering `ms` milliseconds
    pub fn samples_for_ms(&self, ms: u64) -> usize {
        ((u64::from(self.sample_rate) * ms) / 1000) as usize
    }
}

/// Block of mono PCM samples normalized to [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the intake stream started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            timestamp_ms,
        }
    }

    /// Decode little-endian PCM bytes into a normalized frame
    pub fn decode(
        bytes: &[u8],
        pcm: PcmFormat,
        sample_rate: u32,
        channels: u16,
        timestamp_ms: u64,
    ) -> Result<Self> {
        let width = pcm.bytes_per_sample();
        if bytes.len() % width != 0 {
            anyhow::bail!(
                "PCM payload of {} bytes is not a multiple of {} ({:?})",
                bytes.len(),
                width,
                pcm
            );
        }

        let samples = match pcm {
            PcmFormat::S16 => bytes
                .chunks_exact(2)
                .map(|b| i16_to_f32(i16::from_le_bytes([b[0], b[1]])))
                .collect(),
            PcmFormat::F32 => bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).clamp(-1.0, 1.0))
                .collect(),
        };

        Ok(Self {
            samples,
            sample_rate,
            channels,
            timestamp_ms,
        })
    }

    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / (u64::from(self.sample_rate) * u64::from(self.channels))
    }
}

pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Encode normalized samples as little-endian s16 bytes
pub fn encode_s16le(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| f32_to_i16(s).to_le_bytes())
        .collect()
}
