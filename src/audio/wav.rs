use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::frame::f32_to_i16;
use crate::session::Utterance;

/// A finalized utterance queued for archiving
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    /// Capture ID (used for the file name)
    pub capture_id: String,
    pub utterance: Utterance,
}

/// Metadata for one archived utterance
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub capture_id: String,
    /// File path to the WAV file
    pub file_path: PathBuf,
    pub sample_rate: u32,
    /// Number of samples written
    pub sample_count: usize,
    pub duration_ms: u64,
}

/// Writes finalized utterances to disk as 16-bit mono WAV files
pub struct UtteranceArchive {
    output_dir: PathBuf,
}

impl UtteranceArchive {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).context("Failed to create archive directory")?;

        info!("Utterance archive initialized: {}", output_dir.display());

        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Archive utterances until the channel closes
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<ArchiveRequest>,
    ) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();

        while let Some(request) = rx.recv().await {
            match self.write(&request) {
                Ok(entry) => {
                    info!(
                        "Archived utterance {} ({:.2}s, {} samples)",
                        entry.capture_id,
                        entry.duration_ms as f64 / 1000.0,
                        entry.sample_count
                    );
                    entries.push(entry);
                }
                Err(e) => {
                    // Archiving is best effort; keep serving captures
                    warn!("Failed to archive utterance {}: {:#}", request.capture_id, e);
                }
            }
        }

        Ok(entries)
    }

    pub fn write(&self, request: &ArchiveRequest) -> Result<ArchiveEntry> {
        let file_path = self
            .output_dir
            .join(format!("{}.wav", request.capture_id));
        let utterance = &request.utterance;

        let mut writer = WavFileWriter::create(&file_path, utterance.sample_rate)?;
        writer.write_samples(&utterance.samples)?;
        writer.finish()?;

        Ok(ArchiveEntry {
            capture_id: request.capture_id.clone(),
            file_path,
            sample_rate: utterance.sample_rate,
            sample_count: utterance.samples.len(),
            duration_ms: utterance.duration_ms(),
        })
    }
}

struct WavFileWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFileWriter {
    fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
        })
    }

    fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                writer
                    .write_sample(f32_to_i16(sample))
                    .context("Failed to write sample to WAV")?;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(())
    }
}

impl Drop for WavFileWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
