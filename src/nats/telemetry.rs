use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use super::client::NatsClient;
use crate::controller::CaptureFeedback;
use crate::session::SessionEvent;

/// Publish session transitions and capture progress to NATS.
///
/// Runs until both the event and feedback channels close.
pub async fn run_telemetry(
    client: Arc<NatsClient>,
    mut events: broadcast::Receiver<SessionEvent>,
    mut feedback: mpsc::Receiver<CaptureFeedback>,
) {
    info!("Telemetry task started");

    let mut events_open = true;
    let mut feedback_open = true;

    while events_open || feedback_open {
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Ok(SessionEvent::StateChanged { to, .. }) => {
                    if let Err(e) = client.publish_recording_state(to).await {
                        error!("Failed to publish recording state: {:#}", e);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Telemetry fell behind; skipped {} session events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => events_open = false,
            },
            update = feedback.recv(), if feedback_open => match update {
                Some(update) => {
                    if let Err(e) = client.publish_amplitude(&update).await {
                        error!("Failed to publish amplitude: {:#}", e);
                    }
                    if let Err(e) = client.publish_feedback(&update).await {
                        error!("Failed to publish feedback: {:#}", e);
                    }
                }
                None => feedback_open = false,
            },
        }
    }

    info!("Telemetry task stopped");
}
