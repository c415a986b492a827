// Integration tests for the gated recording session
//
// Audio is synthesized (silence and a 440Hz tone) and pushed through the
// session in 20ms frames, the same way the NATS intake delivers it.

mod common;

use anyhow::Result;
use common::{frames, silence, tone};
use loqa_capture::audio::AmplitudeThreshold;
use loqa_capture::error::CaptureError;
use loqa_capture::session::{
    FinishReason, RecordingSession, SessionConfig, SessionEvent, SessionState,
};
use loqa_capture::vad::SpeechClassifier;
use std::time::Duration;

fn push_all(session: &RecordingSession, samples: &[f32]) -> Result<()> {
    for frame in frames(samples) {
        session.push_frame(&frame)?;
    }
    Ok(())
}

#[test]
fn test_quiet_audio_never_reaches_classifier() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;

    // Peak 0.02 stays under the 0.05 gate
    push_all(&session, &tone(1000, 0.02))?;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Armed);
    assert!(!snapshot.gate_open);
    assert_eq!(snapshot.windows_classified, 0);
    assert_eq!(snapshot.buffered_samples, 0);
    Ok(())
}

#[test]
fn test_gate_stays_open_after_first_loud_window() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;

    let mut audio = tone(30, 0.5);
    audio.extend(tone(300, 0.02));
    push_all(&session, &audio)?;

    let snapshot = session.snapshot();
    assert!(snapshot.gate_open);
    // Every window after the loud one is still classified
    assert_eq!(snapshot.windows_classified, 11);
    Ok(())
}

#[test]
fn test_utterance_has_pre_roll_and_ends_at_padded_boundary() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    let mut events = session.subscribe();
    session.arm()?;

    // 300ms silence (10 windows), 1980ms tone (66 windows), 1s silence
    let mut audio = silence(300);
    audio.extend(tone(1980, 0.5));
    audio.extend(silence(1000));
    push_all(&session, &audio)?;

    assert_eq!(session.state(), SessionState::Finished);
    let utterance = session.drain().expect("utterance");

    // Speech starts at window 10 (sample 4800); pre-roll is window 9
    assert_eq!(utterance.start_sample, 4320);
    // First silent sample 36480, plus 100ms padding
    assert_eq!(utterance.samples.len(), (36480 + 1600 - 4320) as usize);
    assert_eq!(utterance.reason, FinishReason::SpeechEnded);

    let began = std::iter::from_fn(|| events.try_recv().ok())
        .find(|e| matches!(e, SessionEvent::RecordingBegan { .. }));
    assert_eq!(
        began,
        Some(SessionEvent::RecordingBegan {
            start_sample: 3200,
            pre_roll_samples: 480
        })
    );
    Ok(())
}

#[test]
fn test_short_pause_does_not_split_utterance() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;

    let mut audio = tone(600, 0.5);
    audio.extend(silence(150));
    audio.extend(tone(600, 0.5));
    push_all(&session, &audio)?;

    // 150ms is under the 300ms hangover
    assert_eq!(session.state(), SessionState::Recording);

    push_all(&session, &silence(500))?;
    assert_eq!(session.state(), SessionState::Finished);
    Ok(())
}

#[test]
fn test_hard_cap_within_one_window() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(1));
    session.arm()?;

    let mut audio = silence(200);
    audio.extend(tone(3000, 0.5));
    push_all(&session, &audio)?;

    assert_eq!(session.state(), SessionState::Finished);
    let utterance = session.drain().expect("utterance");
    assert_eq!(utterance.reason, FinishReason::MaxUtterance);

    let cap = 16000usize;
    assert!(utterance.samples.len() <= cap);
    assert!(utterance.samples.len() + 480 >= cap);
    Ok(())
}

#[test]
fn test_audio_after_finish_is_ignored() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;

    let mut audio = tone(500, 0.5);
    audio.extend(silence(500));
    push_all(&session, &audio)?;
    assert_eq!(session.state(), SessionState::Finished);

    let buffered = session.snapshot().buffered_samples;
    push_all(&session, &tone(1000, 0.5))?;
    assert_eq!(session.snapshot().buffered_samples, buffered);
    Ok(())
}

#[test]
fn test_preempt_then_immediate_arm() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;
    push_all(&session, &tone(500, 0.5))?;
    assert_eq!(session.state(), SessionState::Recording);

    session.preempt();
    assert_eq!(session.state(), SessionState::Preempted);
    assert_eq!(session.snapshot().buffered_samples, 0);
    assert!(session.drain().is_none());

    session.arm()?;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Armed);
    assert_eq!(snapshot.buffered_samples, 0);
    assert!(!snapshot.gate_open);
    assert_eq!(snapshot.windows_classified, 0);
    Ok(())
}

#[test]
fn test_arm_after_reset_starts_clean() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;
    push_all(&session, &tone(200, 0.5))?;

    session.reset();
    assert_eq!(session.state(), SessionState::Idle);

    session.arm()?;
    let snapshot = session.snapshot();
    assert_eq!(snapshot.buffered_samples, 0);
    assert!(!snapshot.gate_open);
    Ok(())
}

#[test]
fn test_runtime_threshold_applies_at_next_arm() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.amplitude_threshold().set(0.3)?;
    assert_eq!(session.amplitude_threshold().get(), 0.3);

    let err = session.amplitude_threshold().set(1.5).unwrap_err();
    assert_eq!(
        err,
        CaptureError::ThresholdOutOfRange {
            value: 1.5,
            current: 0.3
        }
    );
    assert_eq!(session.amplitude_threshold().get(), 0.3);

    session.arm()?;
    // Peak 0.2 is loud for the old threshold but not for the new one
    push_all(&session, &tone(500, 0.2))?;
    assert_eq!(session.snapshot().windows_classified, 0);
    Ok(())
}

#[test]
fn test_mismatched_frames_are_dropped() -> Result<()> {
    let session = common::session(0.05, Duration::from_secs(10));
    session.arm()?;

    let frame = loqa_capture::audio::AudioFrame::new(vec![0.5; 441], 44100, 0);
    session.push_frame(&frame)?;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.frames_dropped, 1);
    assert_eq!(snapshot.windows_classified, 0);
    Ok(())
}

#[test]
fn test_unsupported_format_is_a_configuration_fault() {
    let mut config = SessionConfig::default();
    config.format.sample_rate = 22050;

    let result = RecordingSession::new(
        config,
        Box::new(loqa_capture::vad::EnergyClassifier::default()),
        AmplitudeThreshold::new(0.05).unwrap(),
    );
    assert!(matches!(result, Err(CaptureError::Configuration(_))));
}

struct BrokenClassifier;

impl SpeechClassifier for BrokenClassifier {
    fn speech_probability(&mut self, _window: &[f32]) -> anyhow::Result<f32> {
        anyhow::bail!("model crashed")
    }

    fn reset(&mut self) {}
}

#[test]
fn test_classifier_failure_is_reported() -> Result<()> {
    let session = RecordingSession::new(
        SessionConfig::default(),
        Box::new(BrokenClassifier),
        AmplitudeThreshold::new(0.05)?,
    )?;
    session.arm()?;

    let err = push_all(&session, &tone(100, 0.5)).unwrap_err();
    let capture_error = err.downcast_ref::<CaptureError>();
    assert!(matches!(capture_error, Some(CaptureError::Classifier(_))));
    Ok(())
}
