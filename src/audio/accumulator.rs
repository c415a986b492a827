use std::collections::VecDeque;

/// One VAD-analysis window of contiguous samples
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Offset of the first sample, counted from the last reset
    pub offset: u64,
    pub samples: Vec<f32>,
}

impl Window {
    /// Offset one past the last sample
    pub fn end(&self) -> u64 {
        self.offset + self.samples.len() as u64
    }
}

/// Collects raw samples until a full VAD window is available
///
/// Keeps the window drained before the most recent one as the pre-roll slot,
/// so the audio just ahead of a detected speech start can be recovered.
#[derive(Debug)]
pub struct FrameAccumulator {
    window_samples: usize,
    partial: VecDeque<f32>,
    next_offset: u64,
    latest: Option<Window>,
    pre_roll: Option<Window>,
}

impl FrameAccumulator {
    pub fn new(window_samples: usize) -> Self {
        let window_samples = window_samples.max(1);
        Self {
            window_samples,
            partial: VecDeque::with_capacity(window_samples * 4),
            next_offset: 0,
            latest: None,
            pre_roll: None,
        }
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.partial.extend(samples.iter().copied());
    }

    /// Returns the next complete window, or `None` if not enough data yet.
    ///
    /// Samples beyond the window stay buffered for the following call.
    pub fn drain(&mut self) -> Option<Window> {
        if self.partial.len() < self.window_samples {
            return None;
        }

        let samples: Vec<f32> = self.partial.drain(..self.window_samples).collect();
        let window = Window {
            offset: self.next_offset,
            samples,
        };
        self.next_offset += self.window_samples as u64;

        self.pre_roll = self.latest.replace(window.clone());
        Some(window)
    }

    /// The window completed just before the last drained one
    pub fn pre_roll(&self) -> Option<&Window> {
        self.pre_roll.as_ref()
    }

    /// Samples waiting for a full window
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    pub fn reset(&mut self) {
        self.partial.clear();
        self.next_offset = 0;
        self.latest = None;
        self.pre_roll = None;
    }
}
