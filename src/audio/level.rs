//! Amplitude metering and the energy gate in front of the VAD.

use crate::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const FLOOR_DB: f32 = -96.0;

/// Amplitude of one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AmplitudeLevel {
    /// Peak absolute amplitude, 0.0-1.0
    pub peak: f32,
    /// RMS amplitude, 0.0-1.0
    pub rms: f32,
    /// RMS in dBFS, floored at -96
    pub db: f32,
}

impl AmplitudeLevel {
    pub fn measure(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self {
                peak: 0.0,
                rms: 0.0,
                db: FLOOR_DB,
            };
        }

        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
        let rms = energy.sqrt();
        let db = if rms > 0.0 {
            (20.0 * rms.log10()).max(FLOOR_DB)
        } else {
            FLOOR_DB
        };

        Self {
            peak: peak.min(1.0),
            rms: rms.min(1.0),
            db,
        }
    }
}

/// Runtime-settable amplitude threshold shared between the control surface
/// and the capture session
#[derive(Clone, Debug)]
pub struct AmplitudeThreshold {
    bits: Arc<AtomicU32>,
}

impl AmplitudeThreshold {
    pub fn new(initial: f32) -> CaptureResult<Self> {
        Self::check(initial, 0.0)?;
        Ok(Self {
            bits: Arc::new(AtomicU32::new(initial.to_bits())),
        })
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::SeqCst))
    }

    /// Set a new threshold; out-of-range values leave the prior one in place.
    pub fn set(&self, value: f32) -> CaptureResult<()> {
        Self::check(value, self.get())?;
        self.bits.store(value.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    fn check(value: f32, current: f32) -> CaptureResult<()> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(CaptureError::ThresholdOutOfRange { value, current })
        }
    }
}

/// Sticky energy gate
///
/// Once a window's peak exceeds the threshold the gate stays open until
/// `reset`, so VAD is not toggled on and off at the energy boundary.
#[derive(Debug, Clone)]
pub struct AmplitudeGate {
    threshold: f32,
    open: bool,
    last: AmplitudeLevel,
}

impl AmplitudeGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            open: false,
            last: AmplitudeLevel::measure(&[]),
        }
    }

    pub fn observe(&mut self, window: &[f32]) -> AmplitudeLevel {
        self.last = AmplitudeLevel::measure(window);
        self.last
    }

    /// Returns true once any observed level has exceeded the threshold.
    pub fn has_reached_minimum(&mut self, level: AmplitudeLevel) -> bool {
        if !self.open && level.peak > self.threshold {
            self.open = true;
        }
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn last_level(&self) -> AmplitudeLevel {
        self.last
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Close the gate and apply the threshold for the next session
    pub fn reset(&mut self, threshold: f32) {
        self.threshold = threshold;
        self.open = false;
        self.last = AmplitudeLevel::measure(&[]);
    }
}
