//! HTTP control surface
//!
//! - GET /health - Health check
//! - GET /threshold, PUT /threshold - Runtime amplitude threshold
//! - POST /captures - Start a capture (preempts a running one)
//! - GET /captures/:id - Capture status and results
//! - POST /captures/:id/cancel - Preempt a capture
//! - GET /session - Recording session snapshot

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, CaptureRecord, CaptureStatus};
