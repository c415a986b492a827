use anyhow::Result;
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::messages::AudioFrameMessage;
use crate::audio::PcmFormat;
use crate::session::RecordingSession;

/// Feed audio frames from a NATS subscription into the session.
///
/// Runs until the subscription closes. Frames in the wrong encoding or with
/// bad payloads are dropped; the session itself rejects rate/channel mismatches.
pub async fn run_audio_intake(
    mut subscriber: async_nats::Subscriber,
    session: Arc<RecordingSession>,
    expected: PcmFormat,
) -> Result<()> {
    info!("Audio intake task started");

    let started = Instant::now();
    let mut last_sequence: Option<u32> = None;
    let mut frames: u64 = 0;

    while let Some(msg) = subscriber.next().await {
        let message = match serde_json::from_slice::<AudioFrameMessage>(&msg.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to parse audio frame message: {}", e);
                continue;
            }
        };

        if let Some(last) = last_sequence {
            let expected_seq = last.wrapping_add(1);
            if message.sequence != expected_seq {
                warn!(
                    "Audio frame gap from {}: expected sequence {}, got {}",
                    message.source, expected_seq, message.sequence
                );
            }
        }
        last_sequence = Some(message.sequence);

        if message.format != expected {
            warn!(
                "Dropping {:?} frame from {} (expected {:?})",
                message.format, message.source, expected
            );
            continue;
        }

        let frame = match message.to_frame(started.elapsed().as_millis() as u64) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping undecodable frame {}: {:#}", message.sequence, e);
                continue;
            }
        };

        if let Err(e) = session.push_frame(&frame) {
            error!("Session rejected frame {}: {}", message.sequence, e);
        }
        frames += 1;

        if message.final_frame {
            info!("Source {} sent its final frame", message.source);
        }
    }

    info!("Audio intake task stopped after {} frames", frames);
    Ok(())
}
