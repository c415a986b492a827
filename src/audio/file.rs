use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::frame::{i16_to_f32, AudioFrame};

/// Mono WAV file loaded into memory as normalized samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(i16_to_f32))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            (format, bits) => {
                anyhow::bail!("Unsupported WAV encoding: {:?} {}-bit", format, bits)
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the file into consecutive frames of `frame_ms` milliseconds
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let per_frame = ((u64::from(self.sample_rate) * frame_ms / 1000) as usize
            * usize::from(self.channels.max(1)))
        .max(1);

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file as a live intake stream on a dedicated thread
pub struct FileSource {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FileSource {
    /// Spawn the delivery thread; `deliver` is called once per frame at real-time pace.
    pub fn spawn<F>(file: AudioFile, frame_ms: u64, looped: bool, mut deliver: F) -> Self
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let frames = file.frames(frame_ms);
        let pace = Duration::from_millis(frame_ms);

        let handle = std::thread::spawn(move || {
            info!("File intake started: {} ({} frames)", file.path, frames.len());
            let started = Instant::now();
            let mut delivered: u32 = 0;

            loop {
                for frame in frames.iter() {
                    if thread_stop.load(Ordering::SeqCst) {
                        debug!("File intake stopped after {} frames", delivered);
                        return;
                    }
                    deliver(frame.clone());
                    delivered += 1;

                    let due = started + pace * delivered;
                    if let Some(wait) = due.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                }
                // An empty file has nothing to pace a loop with
                if !looped || frames.is_empty() {
                    break;
                }
            }

            info!("File intake finished: {} frames delivered", delivered);
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Whether the delivery thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.stop();
    }
}
