// Integration tests for utterance archiving and WAV intake
//
// Finalized utterances are written as 16-bit mono WAV files and read back
// through AudioFile, the same path the --wav intake uses.

use anyhow::Result;
use loqa_capture::audio::{ArchiveRequest, AudioFile, UtteranceArchive};
use loqa_capture::session::{FinishReason, Utterance};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn tone_utterance(seconds: f32) -> Utterance {
    let sample_rate = 16000;
    let count = (seconds * sample_rate as f32) as usize;
    let samples = (0..count)
        .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
        .collect();

    Utterance {
        samples,
        sample_rate,
        start_sample: 0,
        reason: FinishReason::SpeechEnded,
    }
}

#[test]
fn test_archive_writes_named_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let archive = UtteranceArchive::new(temp_dir.path())?;

    let entry = archive.write(&ArchiveRequest {
        capture_id: "capture-abc".to_string(),
        utterance: tone_utterance(0.5),
    })?;

    assert_eq!(entry.sample_count, 8000);
    assert_eq!(entry.duration_ms, 500);
    assert!(entry.file_path.exists(), "WAV file should exist");
    assert!(entry
        .file_path
        .to_string_lossy()
        .ends_with("capture-abc.wav"));
    assert!(fs::metadata(&entry.file_path)?.len() > 16000);

    Ok(())
}

#[test]
fn test_archived_wav_reads_back() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let archive = UtteranceArchive::new(temp_dir.path())?;
    let utterance = tone_utterance(1.0);

    let entry = archive.write(&ArchiveRequest {
        capture_id: "roundtrip".to_string(),
        utterance: utterance.clone(),
    })?;

    let audio = AudioFile::open(&entry.file_path)?;
    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), utterance.samples.len());
    assert!((audio.duration_seconds - 1.0).abs() < 0.001);

    // 16-bit quantization error only
    let max_error = audio
        .samples
        .iter()
        .zip(utterance.samples.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_error < 1e-3, "max error {}", max_error);

    Ok(())
}

#[test]
fn test_audio_file_frames_cover_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let archive = UtteranceArchive::new(temp_dir.path())?;
    let entry = archive.write(&ArchiveRequest {
        capture_id: "frames".to_string(),
        utterance: tone_utterance(0.25),
    })?;

    let audio = AudioFile::open(&entry.file_path)?;
    let frames = audio.frames(20);

    // 250ms in 20ms frames: 12 full frames plus a 10ms tail
    assert_eq!(frames.len(), 13);
    assert_eq!(frames[0].samples.len(), 320);
    assert_eq!(frames[12].samples.len(), 160);
    assert_eq!(frames[3].timestamp_ms, 60);

    let total: usize = frames.iter().map(|f| f.samples.len()).sum();
    assert_eq!(total, audio.samples.len());

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[tokio::test]
async fn test_archive_task_drains_queue() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let archive = UtteranceArchive::new(temp_dir.path().join("nested"))?;
    let (tx, rx) = mpsc::channel(4);

    let handle = tokio::spawn(async move { archive.run(rx).await });

    for i in 0..3 {
        tx.send(ArchiveRequest {
            capture_id: format!("capture-{}", i),
            utterance: tone_utterance(0.1),
        })
        .await?;
    }
    drop(tx);

    let entries = handle.await??;
    assert_eq!(entries.len(), 3);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.capture_id, format!("capture-{}", i));
        assert!(entry.file_path.exists());
    }

    Ok(())
}
