//! Typed audio frame passed from the capture worker to the dispatch stage.

use std::time::Instant;

/// A fixed-duration block of mono PCM samples at the pipeline sample rate.
///
/// Immutable once captured. Allocated on the capture worker thread, never in
/// the device callback.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (pipeline rate, e.g. 16000).
    pub sample_rate: u32,
    /// When the capture worker sliced this frame.
    pub captured_at: Instant,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at: Instant::now(),
        }
    }

    /// Peak absolute amplitude of the frame. Empty frames peak at 0.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peak_is_max_absolute_amplitude() {
        let frame = AudioFrame::new(vec![0.1, -0.6, 0.3], 16_000);
        assert_relative_eq!(frame.peak(), 0.6);
    }

    #[test]
    fn empty_frame_peaks_at_zero() {
        let frame = AudioFrame::new(vec![], 16_000);
        assert_relative_eq!(frame.peak(), 0.0);
    }

    #[test]
    fn duration_follows_sample_rate() {
        let frame = AudioFrame::new(vec![0.0; 1_600], 16_000);
        assert_relative_eq!(frame.duration_secs(), 0.1);
    }
}
